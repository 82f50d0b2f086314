// q1bsp-sys — command line front end for the map loader

pub mod cmdline;
pub mod report;
