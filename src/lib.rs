#![warn(clippy::pedantic, clippy::nursery, clippy::cargo)]
#![deny(clippy::use_self, rust_2018_idioms)]
#![allow(clippy::multiple_crate_versions, clippy::module_name_repetitions)]

use std::{
    fmt::Write,
    path::Path,
    sync::mpsc::{self, Receiver, Sender},
    time::Instant,
};

use chrono::NaiveDateTime;
use communication::Message;
use config::{Config, PenaltyExpiry, PostWake};
use eframe::egui::{
    self, Button, CentralPanel, Color32, Layout, RichText, ScrollArea, TopBottomPanel, Window,
};
use log::{info, warn};
use machine::{AlarmMachine, Event, LifecycleState, Policy, TICK_INTERVAL};
use runner::Ticker;
use store::Store;
use time_edit::TimeEditor;
use widgets::CountdownDial;

pub mod alarm;
pub mod communication;
pub mod config;
pub mod error;
pub mod machine;
pub mod photo;
pub mod runner;
pub mod store;
/// hour and minute pickers for egui
pub mod time_edit;
pub mod widgets;

const IMAGE_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "gif", "webp", "bmp", "svg"];

fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

/// Current time in the user's format, or plain `HH:MM:SS` if the format is broken.
fn clock_label(time_format: &str) -> String {
    let now = now();
    let mut label = String::new();
    if write!(label, "{}", now.format(time_format)).is_err() {
        label = now.format("%H:%M:%S").to_string();
    }
    label
}

fn format_remaining(seconds: u64) -> String {
    format!(
        "{}h {}m {}s",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

pub struct ShameAlarm<S: Store> {
    config: Config,
    machine: AlarmMachine<S>,
    editor: TimeEditor,
    ticker: Ticker,
    sender: Sender<Message>,
    receiver: Receiver<Message>,
    notice: Option<String>,
    in_config: bool,
}

impl<S: Store> ShameAlarm<S> {
    /// Takes over a restored machine. A stored alarm is armed again right away,
    /// the same as it was left.
    #[must_use]
    pub fn new(config: Config, mut machine: AlarmMachine<S>) -> Self {
        let editor = machine
            .session()
            .armed_time
            .map(TimeEditor::from)
            .unwrap_or_default();
        if machine.session().armed_time.is_some() {
            if let Err(e) = machine.resume(now()) {
                warn!("couldn't re-arm the stored alarm: {e}");
            }
        }
        let (sender, receiver) = mpsc::channel();
        Self {
            config,
            machine,
            editor,
            ticker: Ticker::new(TICK_INTERVAL, Instant::now()),
            sender,
            receiver,
            notice: None,
            in_config: false,
        }
    }

    fn drain_messages(&mut self) {
        while let Ok(message) = self.receiver.try_recv() {
            if let Message::PhotoFailed { path, reason } = &message {
                self.notice = Some(format!("couldn't add {}: {reason}", path.display()));
            }
            runner::apply(&mut self.machine, message, now());
        }
    }

    fn render_settings(&mut self, ctx: &egui::Context) {
        let mut changed = false;
        Window::new("settings ⚙")
            .open(&mut self.in_config)
            .collapsible(false)
            .show(ctx, |ui| {
                ui.label("When the countdown runs out");
                changed |= ui
                    .radio_value(
                        &mut self.config.on_penalty_expire,
                        PenaltyExpiry::TransitionToPenalty,
                        "show the penalty screen",
                    )
                    .changed();
                changed |= ui
                    .radio_value(
                        &mut self.config.on_penalty_expire,
                        PenaltyExpiry::MarkSent,
                        "send the photo right away",
                    )
                    .changed();
                ui.separator();
                ui.label("After waking up");
                changed |= ui
                    .radio_value(&mut self.config.post_wake, PostWake::Disarm, "turn the alarm off")
                    .changed();
                changed |= ui
                    .radio_value(
                        &mut self.config.post_wake,
                        PostWake::RearmNextDay,
                        "keep it for tomorrow",
                    )
                    .changed();
                ui.separator();
                changed |= ui
                    .add(
                        egui::Slider::new(&mut self.config.penalty_seconds, 1..=60)
                            .integer()
                            .suffix("s")
                            .text("countdown"),
                    )
                    .changed();
            });
        if changed {
            self.machine.set_policy(Policy::from(&self.config));
            self.save();
        }
    }

    fn render_header(&mut self, ctx: &egui::Context) {
        TopBottomPanel::top("time_and_ctrl").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let theme_btn = ui.add(Button::new({
                    if self.config.theme == config::Theme::Dark {
                        "🌞"
                    } else {
                        "🌙"
                    }
                }));
                if theme_btn.clicked() {
                    self.config.theme = !self.config.theme;
                    self.save();
                }
                ui.label(format!("Time: {}", clock_label(&self.config.time_format)));
                ui.with_layout(Layout::right_to_left(eframe::emath::Align::Min), |ui| {
                    if ui.button("⚙").on_hover_text("settings").clicked() {
                        self.in_config = true;
                    }
                });
            });
        });
    }

    fn pick_photos(&self) {
        let file_dialog = rfd::FileDialog::new()
            .set_title("Pick embarrassing photos")
            .add_filter("images", &IMAGE_EXTENSIONS);
        let file_dialog = match directories::UserDirs::new()
            .and_then(|u| u.picture_dir().map(Path::to_path_buf))
        {
            Some(picture_path) => file_dialog.set_directory(picture_path),
            None => file_dialog,
        };
        if let Some(paths) = file_dialog.pick_files() {
            info!("loading {} photos", paths.len());
            // photos show up through the channel as they finish loading
            photo::ingest(paths, self.sender.clone());
        }
    }

    fn arm(&mut self) {
        let Some(time) = self.editor.time() else {
            self.notice = Some("pick a valid time".to_string());
            return;
        };
        let photos = self.machine.session().photos.clone();
        self.notice = self
            .machine
            .arm(&time.to_string(), photos, now())
            .err()
            .map(|e| e.to_string());
    }

    fn render_idle(&mut self, ui: &mut egui::Ui) {
        ui.heading("Set your alarm");
        self.editor.render(ui);
        ui.separator();

        ui.horizontal(|ui| {
            if ui.button("Add photos").clicked() {
                self.pick_photos();
            }
            ui.label(match self.machine.session().photos.len() {
                0 => "no photos yet".to_string(),
                1 => "1 photo".to_string(),
                n => format!("{n} photos"),
            });
        });
        let mut remove = None;
        ScrollArea::vertical().max_height(200.).show(ui, |ui| {
            for (i, photo) in self.machine.session().photos.iter().enumerate() {
                ui.horizontal(|ui| {
                    if ui.button("x").on_hover_text("remove photo").clicked() {
                        remove = Some(i);
                    }
                    ui.label(photo.to_string());
                });
            }
        });
        if let Some(i) = remove {
            self.machine.remove_photo(i);
        }

        let ready = !self.machine.session().photos.is_empty();
        if ui
            .add_enabled(ready, Button::new(RichText::new("🔔 Set alarm").heading()))
            .on_disabled_hover_text("add at least one photo first")
            .clicked()
        {
            self.arm();
        }
    }

    fn render_armed(&mut self, ui: &mut egui::Ui) {
        let session = self.machine.session();
        if let Some(time) = session.armed_time {
            ui.heading(format!("Alarm is set for {time}"));
        }
        ui.label("Time remaining:");
        ui.label(RichText::new(format_remaining(session.seconds_until_alarm)).heading());
        ui.separator();
        if ui.button("I'm already up, turn it off").clicked() {
            self.machine.disarm();
        }
    }

    fn render_round(&mut self, ui: &mut egui::Ui, state: LifecycleState) {
        let session = self.machine.session();
        let photo = session
            .selected_photo
            .as_ref()
            .map_or_else(|| "a photo".to_string(), ToString::to_string);
        let penalty = state == LifecycleState::Penalty;
        ui.heading(if penalty { "TIME'S UP!" } else { "WAKE UP!" });

        if session.disclosed {
            ui.label(RichText::new(format!("📸 {photo} was sent!")).heading());
            ui.label("(sharing isn't implemented, nothing actually left this computer)");
        } else {
            ui.label(format!(
                "{photo} will be sent in {} seconds!",
                session.seconds_until_penalty
            ));
            ui.add(
                CountdownDial::new(session.seconds_until_penalty, self.machine.policy().penalty_seconds)
                    .hand_color(Color32::RED)
                    .radius(60.),
            );
            let label = if penalty {
                "Cancel (you woke up!)"
            } else {
                "I WOKE UP!"
            };
            if ui.button(RichText::new(label).heading()).clicked() {
                self.machine.wake_up();
                return;
            }
        }

        ui.horizontal(|ui| {
            if (penalty || self.machine.session().disclosed) && ui.button("Another round").clicked() {
                self.machine.another_round();
            }
            if ui.button("Set new alarm").clicked() {
                self.machine.reset();
            }
        });
    }

    fn render_resolved(&mut self, ui: &mut egui::Ui) {
        ui.heading("Good morning! 😊");
        let next = match self.machine.policy().post_wake {
            PostWake::Disarm => "Continue",
            PostWake::RearmNextDay => "Set for tomorrow",
        };
        if ui.button(next).clicked() {
            self.machine.acknowledge(now());
        }
    }

    fn handle_event(ctx: &egui::Context, event: &Event) {
        match event {
            Event::Fired | Event::PenaltyStarted => {
                ctx.send_viewport_cmd(egui::ViewportCommand::Focus);
            }
            Event::Disclosed(photo) => info!("round lost, {photo} counts as sent"),
        }
    }

    fn save(&self) {
        if let Some(path) = Config::config_path() {
            if let Err(e) = self.config.save(&path) {
                warn!("couldn't save config: {e}");
            }
        }
    }
}

impl<S: Store> eframe::App for ShameAlarm<S> {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.set_visuals(self.config.theme.into());
        self.drain_messages();
        if self.in_config {
            self.render_settings(ctx);
        }
        self.render_header(ctx);

        let state = self.machine.state();
        CentralPanel::default().show(ctx, |ui| {
            match state {
                LifecycleState::Idle => self.render_idle(ui),
                LifecycleState::Armed => self.render_armed(ui),
                LifecycleState::Ringing | LifecycleState::Penalty => self.render_round(ui, state),
                LifecycleState::Resolved => self.render_resolved(ui),
            }
            if self.machine.is_degraded() {
                ui.colored_label(Color32::YELLOW, "storage unavailable, nothing will be saved");
            }
            if let Some(notice) = &self.notice {
                ui.colored_label(Color32::RED, notice.as_str());
            }
        });

        // clicks from this frame are already in, so they win over the tick
        if self.ticker.due(Instant::now()) {
            if let Some(event) = self.machine.tick(now()) {
                Self::handle_event(ctx, &event);
            }
        }
        ctx.request_repaint_after(self.ticker.remaining(Instant::now()));
    }
}

impl<S: Store> Drop for ShameAlarm<S> {
    fn drop(&mut self) {
        self.machine.shutdown();
    }
}
