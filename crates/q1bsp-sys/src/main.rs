// main.rs — q1bsp entry point
//
// Loads one map, prints its lump summary, then answers point queries:
//
//   q1bsp [+set name value]... <map.bsp> [x y z]...

use std::panic;
use std::process::ExitCode;

use q1bsp_common::bspmodel::Map;
use q1bsp_common::common::{com_error, com_printf, ERR_DROP, ERR_FATAL};
use q1bsp_common::cvar::{cvar_force_set, cvar_init, cvar_shutdown, cvar_variable_value};
use q1bsp_common::files::FsContext;
use q1bsp_common::vis::VisCache;
use q1bsp_sys::cmdline::{CommandLine, USAGE};
use q1bsp_sys::report::{print_map_summary, query_point};

/// Game directory searched after the path as given.
const GAMEDIR: &str = "id1";

fn run(args: &[String]) -> ExitCode {
    let cmdline = match CommandLine::parse(args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}\n{}", e, USAGE);
            return ExitCode::FAILURE;
        }
    };

    cvar_init();
    for (name, value) in &cmdline.sets {
        cvar_force_set(name, value);
    }

    // developer output is logged at debug level
    let level = if cvar_variable_value("developer") != 0.0 { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut fs = FsContext::new();
    fs.add_search_path(GAMEDIR);

    let map = match Map::load(&fs, &cmdline.map) {
        Ok(map) => map,
        Err(e) => {
            let msg = format!("Mod_LoadBrushModel: {}: {}", cmdline.map, e);
            // fatal errors panic out of com_error
            com_error(if e.is_fatal() { ERR_FATAL } else { ERR_DROP }, &msg);
            return ExitCode::FAILURE;
        }
    };

    print_map_summary(&map);

    let mut vis = VisCache::from_cvars();
    for (frame, point) in cmdline.points.iter().enumerate() {
        let report = query_point(&map, &mut vis, *point, frame as u32 + 1);
        com_printf(&format!("{}\n", report.describe()));
    }

    cvar_shutdown();
    ExitCode::SUCCESS
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match panic::catch_unwind(|| run(&args)) {
        Ok(code) => code,
        Err(_) => ExitCode::FAILURE,
    }
}
