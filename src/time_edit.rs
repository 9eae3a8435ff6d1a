use chrono::Timelike;
use eframe::egui::{self, TextEdit, Widget};

use crate::alarm::AlarmTime;

/// Hour and minute selectors for picking the wake up time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeEditor {
    hour: u32,
    minute: u32,
    hour_string: String,
    minute_string: String,
}

impl Default for TimeEditor {
    fn default() -> Self {
        let time = chrono::Local::now().naive_local().time();
        Self::new(time.hour(), time.minute())
    }
}

impl From<AlarmTime> for TimeEditor {
    fn from(time: AlarmTime) -> Self {
        Self::new(time.hour(), time.minute())
    }
}

impl TimeEditor {
    #[must_use]
    pub fn new(hour: u32, minute: u32) -> Self {
        let hour = hour % 24;
        let minute = minute % 60;
        Self {
            hour,
            minute,
            hour_string: format!("{hour:02}"),
            minute_string: format!("{minute:02}"),
        }
    }

    #[must_use]
    pub fn time(&self) -> Option<AlarmTime> {
        AlarmTime::new(self.hour, self.minute).ok()
    }

    /// Moves the hour by one, wrapping around midnight.
    pub fn step_hour(&mut self, up: bool) {
        self.hour = if up { (self.hour + 1) % 24 } else { (self.hour + 23) % 24 };
        self.hour_string = format!("{:02}", self.hour);
    }

    pub fn step_minute(&mut self, up: bool) {
        self.minute = if up {
            (self.minute + 1) % 60
        } else {
            (self.minute + 59) % 60
        };
        self.minute_string = format!("{:02}", self.minute);
    }

    /// Takes whatever was typed into the hour box if it is a valid hour,
    /// then syncs the box with the value regardless.
    pub fn commit_hour_text(&mut self) {
        if let Ok(parsed_value) = self.hour_string.trim().parse::<u32>() {
            self.hour = parsed_value.min(23);
        }
        self.hour_string = format!("{:02}", self.hour);
    }

    pub fn commit_minute_text(&mut self) {
        if let Ok(parsed_value) = self.minute_string.trim().parse::<u32>() {
            self.minute = parsed_value.min(59);
        }
        self.minute_string = format!("{:02}", self.minute);
    }

    pub fn render(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            self.render_hour_selector(ui);
            ui.label(":");
            self.render_minute_selector(ui);
        });
    }

    fn render_hour_selector(&mut self, ui: &mut egui::Ui) {
        ui.vertical(|ui| {
            ui.label("Hour");
            if ui.button("Up").clicked() {
                self.step_hour(true);
            }
            if TextEdit::singleline(&mut self.hour_string)
                .desired_width(20.0)
                .char_limit(2)
                .ui(ui)
                .lost_focus()
            {
                self.commit_hour_text();
            }
            if ui.button("Down").clicked() {
                self.step_hour(false);
            }
        });
    }

    fn render_minute_selector(&mut self, ui: &mut egui::Ui) {
        ui.vertical(|ui| {
            ui.label("Minute");
            if ui.button("Up").clicked() {
                self.step_minute(true);
            }
            if TextEdit::singleline(&mut self.minute_string)
                .desired_width(20.0)
                .char_limit(2)
                .ui(ui)
                .lost_focus()
            {
                self.commit_minute_text();
            }
            if ui.button("Down").clicked() {
                self.step_minute(false);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_wrap_around() {
        let mut editor = TimeEditor::new(23, 59);
        editor.step_minute(true);
        editor.step_hour(true);
        assert_eq!(editor.time().unwrap().to_string(), "00:00");
        editor.step_hour(false);
        editor.step_minute(false);
        assert_eq!(editor.time().unwrap().to_string(), "23:59");
    }

    #[test]
    fn typed_values_are_clamped_or_ignored() {
        let mut editor = TimeEditor::new(7, 0);
        editor.hour_string = "42".to_string();
        editor.commit_hour_text();
        assert_eq!(editor.hour_string, "23");

        editor.minute_string = "x5".to_string();
        editor.commit_minute_text();
        assert_eq!(editor.minute_string, "00");

        editor.minute_string = "5".to_string();
        editor.commit_minute_text();
        assert_eq!(editor.time().unwrap().to_string(), "23:05");
    }

    #[test]
    fn starts_from_a_stored_time() {
        let editor = TimeEditor::from("06:30".parse::<AlarmTime>().unwrap());
        assert_eq!(editor.time().unwrap().to_string(), "06:30");
    }
}
