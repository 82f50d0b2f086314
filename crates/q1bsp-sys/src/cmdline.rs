// cmdline.rs — command line parsing for the q1bsp tool
//
// q1bsp [+set name value]... <map.bsp> [x y z]...
//
// `+set` pairs are applied to the cvars before the map loads, the way the engine applies
// them ahead of subsystem init.

use std::fmt;

use q1bsp_common::q_shared::Vec3;

pub const USAGE: &str = "usage: q1bsp [+set name value]... <map.bsp> [x y z]...";

#[derive(Debug, Clone, PartialEq)]
pub struct CommandLine {
    /// Cvar overrides, in command line order.
    pub sets: Vec<(String, String)>,
    pub map: String,
    pub points: Vec<Vec3>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgsError {
    MissingMap,
    /// `+set` without both a name and a value.
    IncompleteSet,
    /// Coordinates did not come in groups of three.
    IncompletePoint { given: usize },
    BadCoordinate(String),
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingMap => write!(f, "no map given"),
            ArgsError::IncompleteSet => write!(f, "+set needs a name and a value"),
            ArgsError::IncompletePoint { given } => {
                write!(f, "points need three coordinates ({} given)", given)
            }
            ArgsError::BadCoordinate(s) => write!(f, "bad coordinate \"{}\"", s),
        }
    }
}

impl std::error::Error for ArgsError {}

impl CommandLine {
    /// Parses the arguments after the program name.
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self, ArgsError> {
        let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
        let mut sets = Vec::new();
        let mut rest = Vec::new();

        let mut i = 0;
        while i < args.len() {
            let s = args[i];
            if s != "+set" {
                rest.push(s);
                i += 1;
                continue;
            }
            match (args.get(i + 1), args.get(i + 2)) {
                (Some(name), Some(value)) => {
                    sets.push((name.to_string(), value.to_string()));
                }
                _ => return Err(ArgsError::IncompleteSet),
            }
            i += 3;
        }

        let (map, coords) = rest.split_first().ok_or(ArgsError::MissingMap)?;
        if coords.len() % 3 != 0 {
            return Err(ArgsError::IncompletePoint { given: coords.len() });
        }

        let values = coords
            .iter()
            .map(|c| c.parse::<f32>().map_err(|_| ArgsError::BadCoordinate(c.to_string())))
            .collect::<Result<Vec<_>, _>>()?;
        let points = values.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect();

        Ok(Self { sets, map: map.to_string(), points })
    }
}
