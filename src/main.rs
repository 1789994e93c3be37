use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::process::exit;

use clap::{Arg, ArgAction, Command};

use retrobox::cpu::HaltReason;
use retrobox::machine::Machine;

fn main() {
    env_logger::init();

    let matches = Command::new("retrobox")
        .version("0.1.0")
        .about("PC/8086 emulator with a DOS personality and a FAT12 floppy")
        .arg(
            Arg::new("INPUT")
                .help("program image to run (.com or MZ .exe)")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("args")
                .long("args")
                .help("command tail passed to the program")
                .default_value(""),
        )
        .arg(
            Arg::new("deterministic")
                .long("deterministic")
                .help("pin clock reads for reproducible runs")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let filename = matches.get_one::<String>("INPUT").unwrap();
    let command_tail = matches.get_one::<String>("args").unwrap();

    let data = match read_binary(filename) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("could not read {}: {}", filename, e);
            exit(1);
        }
    };

    let mut machine = if matches.get_flag("deterministic") {
        Machine::deterministic()
    } else {
        Machine::default()
    };

    let name = Path::new(filename)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| filename.to_string());
    machine.load_executable(&data, &name, command_tail);

    while machine.is_running() {
        machine.tick();
        if machine.cpu.halt_reason == HaltReason::KeyWait {
            // no host key pump in the headless runner
            eprintln!("program is waiting for keyboard input, stopping");
            break;
        }
    }

    // make the floppy durable before the session goes away
    machine.disk.flush();

    for row in machine.render_text() {
        let line = row.trim_end();
        if !line.is_empty() {
            println!("{}", line);
        }
    }

    if machine.cpu.fatal_error {
        eprintln!("session aborted");
        exit(1);
    }
}

fn read_binary(path: &str) -> std::io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    File::open(path)?.read_to_end(&mut buffer)?;
    Ok(buffer)
}
