use std::path::Path;
use std::process;
use std::sync::Arc;

use clap::{App, Arg, SubCommand};

use afp::{audio::AudioRecorder, Config, IdentifyOutput, OutputFormat, Recognizer};

fn parse_format(format_str: &str) -> OutputFormat {
    match format_str {
        "json" => OutputFormat::Json,
        "csv" => OutputFormat::Csv,
        _ => OutputFormat::Simple,
    }
}

fn main() {
    let matches = App::new("afp-cli")
        .version(afp::VERSION)
        .about("A headless acoustic-fingerprint recognizer")
        .arg(
            Arg::with_name("db")
                .long("db")
                .value_name("PATH")
                .help("Path to the fingerprint database")
                .takes_value(true)
                .default_value("afp.db")
                .global(true),
        )
        .subcommand(
            SubCommand::with_name("learn")
                .about("Learn a track from an audio file")
                .arg(Arg::with_name("input").required(true).help("Input audio file path").index(1))
                .arg(Arg::with_name("name").required(true).help("Display name for the track").index(2)),
        )
        .subcommand(
            SubCommand::with_name("identify")
                .about("Identify a track from an audio file")
                .arg(Arg::with_name("input").required(true).help("Input audio file path").index(1))
                .arg(
                    Arg::with_name("format")
                        .short("f")
                        .long("format")
                        .value_name("FORMAT")
                        .help("Output format: simple, json, csv")
                        .takes_value(true)
                        .default_value("simple"),
                ),
        )
        .subcommand(SubCommand::with_name("list-tracks").about("List learned tracks"))
        .subcommand(SubCommand::with_name("devices").about("List available audio input devices"))
        .subcommand(
            SubCommand::with_name("listen")
                .about("Continuously capture audio and report matches as they're identified")
                .arg(
                    Arg::with_name("device")
                        .long("device")
                        .value_name("NAME")
                        .help("Input device name (defaults to the system default)")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("format")
                        .short("f")
                        .long("format")
                        .value_name("FORMAT")
                        .help("Output format: simple, json, csv")
                        .takes_value(true)
                        .default_value("simple"),
                ),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Enable verbose debug output")
                .global(true),
        )
        .get_matches();

    let verbose = matches.is_present("verbose");
    let config = Config::default().with_quiet_mode(!verbose);
    let db_path = Path::new(matches.value_of("db").unwrap());

    match matches.subcommand() {
        ("learn", Some(sub_matches)) => {
            let input_file = sub_matches.value_of("input").unwrap();
            let name = sub_matches.value_of("name").unwrap();

            let mut recognizer = match Recognizer::open_with_config(db_path, config) {
                Ok(r) => r,
                Err(e) => {
                    eprintln!("Error opening database: {}", e);
                    process::exit(1);
                }
            };

            match recognizer.learn_from_file(name, Path::new(input_file)) {
                Ok(track_id) => {
                    if let Err(e) = recognizer.save(db_path) {
                        eprintln!("Error saving database: {}", e);
                        process::exit(1);
                    }
                    println!("Learned '{}' as track {}", name, track_id);
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    process::exit(1);
                }
            }
        }
        ("identify", Some(sub_matches)) => {
            let input_file = sub_matches.value_of("input").unwrap();
            let format = parse_format(sub_matches.value_of("format").unwrap());

            let recognizer = match Recognizer::open_with_config(db_path, config) {
                Ok(r) => r,
                Err(e) => {
                    eprintln!("Error opening database: {}", e);
                    process::exit(1);
                }
            };

            match recognizer.identify_from_file(Path::new(input_file)) {
                Ok(Some(outcome)) => {
                    let output = IdentifyOutput::format_result(&outcome, format);
                    println!("{}", output);
                }
                Ok(None) => {
                    let output = IdentifyOutput::format_no_match(format);
                    println!("{}", output);
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    process::exit(1);
                }
            }
        }
        ("list-tracks", Some(_)) => {
            let recognizer = match Recognizer::open_with_config(db_path, config) {
                Ok(r) => r,
                Err(e) => {
                    eprintln!("Error opening database: {}", e);
                    process::exit(1);
                }
            };

            for track in recognizer.list_tracks() {
                println!("{}: {} ({} fingerprints)", track.track_id, track.name, track.fingerprint_count);
            }
        }
        ("listen", Some(sub_matches)) => {
            let device = sub_matches.value_of("device").map(|s| s.to_string());
            let format = parse_format(sub_matches.value_of("format").unwrap());

            let recognizer = match Recognizer::open_with_config(db_path, config) {
                Ok(r) => Arc::new(r),
                Err(e) => {
                    eprintln!("Error opening database: {}", e);
                    process::exit(1);
                }
            };

            let stream = match recognizer.start_identify_stream(device) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("Error starting capture: {}", e);
                    process::exit(1);
                }
            };

            println!("Listening for matches (Ctrl+C to stop)...");
            for result in stream {
                match result {
                    Ok(Some(outcome)) => println!("{}", IdentifyOutput::format_result(&outcome, format)),
                    Ok(None) => println!("{}", IdentifyOutput::format_no_match(format)),
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
        }
        ("devices", Some(_)) => match AudioRecorder::list_input_devices() {
            Ok(devices) => {
                println!("Available audio input devices:");
                for (i, device) in devices.iter().enumerate() {
                    println!("  {}: {}", i, device);
                }
            }
            Err(e) => {
                eprintln!("Error listing devices: {}", e);
                process::exit(1);
            }
        },
        _ => {
            eprintln!("No subcommand given. Run with --help for usage.");
            process::exit(1);
        }
    }
}
