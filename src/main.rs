#![warn(clippy::pedantic, clippy::nursery, clippy::cargo)]
#![deny(
    clippy::use_self,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::missing_panics_doc
)]

use std::{error::Error, io::BufRead, path::PathBuf, sync::mpsc, thread};

use clap::{Parser, Subcommand};
use eframe::{egui::ViewportBuilder, run_native};
use shame_alarm::{
    communication::Message,
    config::Config,
    machine::{AlarmMachine, Policy, TICK_INTERVAL},
    photo,
    runner,
    store::{FileStore, MemoryStore, Store},
    ShameAlarm,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Write the default config file
    Init {
        #[clap(long, short)]
        force: bool,
    },
    /// Add photos to the penalty pool
    AddPhotos { paths: Vec<PathBuf> },
    /// Arm the alarm for a 24h time like 07:30
    Arm { time: String },
    /// Turn the stored alarm off
    Disarm,
    /// Show the stored alarm and photos
    Status,
    /// Run the stored alarm in the terminal
    Watch,
}

fn now() -> chrono::NaiveDateTime {
    chrono::Local::now().naive_local()
}

fn store() -> Box<dyn Store> {
    match FileStore::in_data_dir() {
        Some(store) => Box::new(store),
        None => {
            log::warn!("no data directory on this platform, nothing will be saved");
            Box::new(MemoryStore::new())
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    // initilize the logger
    if let Err(e) = simple_file_logger::init_logger!("shame_alarm") {
        eprintln!("couldn't initialize logger: {e:?}");
    }

    let config = Config::config_path().map_or_else(Config::new, |path| Config::load(&path));
    let policy = Policy::from(&config);

    let args = Args::parse();
    match args.command {
        Some(Command::Init { force }) => {
            if force && Config::is_config_present() || !Config::is_config_present() {
                let path = Config::config_path().ok_or("no config directory on this platform")?;
                Config::new().save(&path)?;
                println!("wrote {}", path.display());
            }
            return Ok(());
        }
        Some(Command::AddPhotos { paths }) => {
            let mut machine = AlarmMachine::restore(store(), policy);
            for path in paths {
                match photo::load_photo(&path) {
                    Ok(photo) => {
                        if machine.add_photo(photo) {
                            println!("added {}", path.display());
                        }
                    }
                    Err(e) => eprintln!("{e}"),
                }
            }
            println!("{} photos in the pool", machine.session().photos.len());
            return Ok(());
        }
        Some(Command::Arm { time }) => {
            let mut machine = AlarmMachine::restore(store(), policy);
            let photos = machine.session().photos.clone();
            // a stored alarm may be running in the app or `watch` right now
            machine.arm_unless_pending(&time, photos, now())?;
            if let Some(target) = machine.session().target {
                println!("alarm set for {target}, run `watch` or start the app to keep it");
            }
            return Ok(());
        }
        Some(Command::Disarm) => {
            let mut machine = AlarmMachine::restore(store(), policy);
            if machine.resume(now()).is_ok() && machine.disarm() {
                println!("alarm turned off");
            } else {
                println!("no alarm was set");
            }
            return Ok(());
        }
        Some(Command::Status) => {
            let machine = AlarmMachine::restore(store(), policy);
            let session = machine.session();
            match session.armed_time {
                Some(time) => println!(
                    "alarm set for {time}, next at {}",
                    time.next_fire_after(now())
                ),
                None => println!("no alarm set"),
            }
            for photo in &session.photos {
                println!("  {photo}");
            }
            return Ok(());
        }
        Some(Command::Watch) => return watch(policy),
        None => {}
    }

    // make app trnsparent
    let native_options = eframe::NativeOptions {
        viewport: ViewportBuilder {
            transparent: Some(true),
            ..Default::default()
        },
        ..Default::default()
    };
    let machine = AlarmMachine::restore(store(), policy);
    // run the gui
    run_native(
        "Shame Alarm",
        native_options,
        Box::new(|_| Ok(Box::new(ShameAlarm::new(config, machine)))),
    )
    .map_err(std::convert::Into::into)
}

fn watch(policy: Policy) -> Result<(), Box<dyn Error>> {
    let mut machine = AlarmMachine::restore(store(), policy);
    machine.resume(now())?;
    if machine.is_degraded() {
        eprintln!("storage unavailable, running from memory");
    }

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            match Message::from_command(&line) {
                Some(message) => {
                    if tx.send(message).is_err() {
                        break;
                    }
                }
                None => eprintln!("commands: [w]ake, [r]ound, [o]k, [d]isarm, [x] reset, [q]uit"),
            }
        }
        // stdin closed
        let _ = tx.send(Message::Quit);
    });

    println!("{}", runner::describe(machine.session()));
    runner::run(&mut machine, &rx, TICK_INTERVAL, now, |session, event| {
        if let Some(event) = event {
            log::info!("{event:?}");
        }
        println!("{}", runner::describe(session));
    });
    Ok(())
}
