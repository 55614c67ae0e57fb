/*
This code is part of the shpio shapefile library.
Authors: Dr. John Lindsay
Created: 10/09/2026
Last Modified: 18/10/2026
License: MIT
*/

/*!
shp_info prints the contents of an ESRI Shapefile pair. It is run from a
terminal with the following flags:

| Flag              | Description                                                            |
| ----------------- | ---------------------------------------------------------------------- |
| -i, --input       | The input shapefile, e.g. -i=roads.shp.                                |
| --record          | Prints one record, or all of them; --record=12, --record=all.          |
| --restore_shx     | Rebuilds a missing .shx file from the .shp before opening.             |
| --lazy            | Reads .shx entries only as records are requested.                      |
| -v                | Verbose mode; logs debug output.                                       |
| --save_settings   | Stores the --restore_shx, --lazy and -v choices in settings.json.      |
| -h, --help        | Prints help information.                                               |
| --version         | Prints the version information.                                        |
*/

use log::debug;
use shpio_common::configs::{get_configs, save_configs};
use shpio_common::utils::get_formatted_elapsed_time;
use shpio_vector::{AccessMode, Shapefile, ShapefileError};
use std::env;
use std::io::{Error, ErrorKind};
use std::time::Instant;

fn main() {
    match run() {
        Ok(()) => {}
        Err(err) => panic!("{}", err),
    }
}

enum RecordSelection {
    None,
    One(usize),
    All,
}

fn run() -> Result<(), Error> {
    let args: Vec<String> = env::args().collect();
    if args.len() <= 1 {
        version();
        help();
        return Ok(());
    }

    let mut configs = get_configs()?;
    let mut input_file = String::new();
    let mut records = RecordSelection::None;
    let mut save_settings = false;

    for arg in args.iter().skip(1) {
        let flag_val = arg.to_lowercase().replace("--", "-");
        if flag_val == "-h" || flag_val == "-help" {
            help();
            return Ok(());
        } else if flag_val == "-version" {
            version();
            return Ok(());
        } else if flag_val.starts_with("-i") || flag_val.starts_with("-input") {
            input_file = flag_value(arg, &["--input", "-input", "-i"]);
        } else if flag_val.starts_with("-record") {
            let v = flag_value(arg, &["--record", "-record"]);
            records = if v.to_lowercase() == "all" {
                RecordSelection::All
            } else {
                RecordSelection::One(v.parse::<usize>().map_err(|_| {
                    Error::new(ErrorKind::InvalidInput, format!("Invalid record number '{}'", v))
                })?)
            };
        } else if flag_val == "-restore_shx" {
            configs.restore_index_if_missing = true;
        } else if flag_val == "-lazy" {
            configs.lazy_index_loading = true;
        } else if flag_val == "-v" {
            configs.verbose_mode = true;
        } else if flag_val == "-save_settings" {
            save_settings = true;
        }
    }

    let level = if configs.verbose_mode {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new().filter_level(level).init();

    if save_settings {
        save_configs(&configs)?;
        debug!("Saved settings.json");
    }

    if input_file.is_empty() {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            "No input file was specified; use -i=file.shp",
        ));
    }

    let start = Instant::now();
    let mut input = Shapefile::open_with_configs(&input_file, AccessMode::Read, &configs).map_err(to_io_error)?;
    let info = input.get_info();
    println!("File: {}", input.get_short_filename());
    println!("Shape type: {}", info.shape_type);
    println!("Number of records: {}", info.num_records);
    println!(
        "Extent: x: [{}, {}], y: [{}, {}], z: [{}, {}], m: [{}, {}]",
        info.bounds_min[0],
        info.bounds_max[0],
        info.bounds_min[1],
        info.bounds_max[1],
        info.bounds_min[2],
        info.bounds_max[2],
        info.bounds_min[3],
        info.bounds_max[3]
    );

    let selected = match records {
        RecordSelection::None => 0..0,
        RecordSelection::One(i) => i..i + 1,
        RecordSelection::All => 0..info.num_records,
    };
    for i in selected {
        let record = input.read_record(i).map_err(to_io_error)?;
        println!(
            "\nRecord {} ({} parts, {} points, {} x {})",
            i,
            record.num_parts(),
            record.num_points(),
            record.bounds.get_width(),
            record.bounds.get_height()
        );
        println!("{}", record);
    }
    input.close().map_err(to_io_error)?;

    debug!("Elapsed time: {}", get_formatted_elapsed_time(start));
    Ok(())
}

/// Strips a flag's name, an optional `=`, and any quotes from an argument.
fn flag_value(arg: &str, names: &[&str]) -> String {
    let mut v = arg.to_string();
    for name in names {
        if v.starts_with(name) {
            v = v[name.len()..].to_string();
            break;
        }
    }
    let v = v.replace("\"", "").replace("\'", "");
    match v.strip_prefix('=') {
        Some(s) => s.to_string(),
        None => v,
    }
}

fn to_io_error(e: ShapefileError) -> Error {
    match e {
        ShapefileError::Io(e) => e,
        e => Error::new(ErrorKind::Other, e.to_string()),
    }
}

fn help() {
    let mut ext = "";
    if cfg!(target_os = "windows") {
        ext = ".exe";
    }

    let exe_name = &format!("shp_info{}", ext);
    let s = "shp_info Help

The following commands are recognized:
-i, --input         The input shapefile; -i=roads.shp.
--record            Prints a record, or all records; --record=3, --record=all.
--restore_shx       Rebuilds a missing .shx index from the .shp file.
--lazy              Reads .shx entries only as records are requested.
-v                  Verbose mode. Logs file lifecycle and recovery details.
--save_settings     Stores the --restore_shx, --lazy and -v choices in settings.json.
-h, --help          Prints help information.
--version           Prints the version information.

Example Usage:
>> ./EXE_NAME -i=roads.shp --record=all -v
"
    .replace("EXE_NAME", exe_name);
    println!("{}", s);
}

fn version() {
    const VERSION: Option<&'static str> = option_env!("CARGO_PKG_VERSION");
    println!(
        "shp_info v{} by Dr. John B. Lindsay (c) 2026

shp_info reports the header and records of an ESRI Shapefile pair.",
        VERSION.unwrap_or("unknown")
    );
}
