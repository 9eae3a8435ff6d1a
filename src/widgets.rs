use eframe::egui::{Align2, Color32, FontId, Sense, Stroke, Vec2, Widget};

/// A round dial whose hand sweeps back to the top as a countdown runs out,
/// with the seconds left written in the middle.
pub struct CountdownDial {
    remaining: u32,
    total: u32,
    hand_color: Option<Color32>,
    fill: Option<Color32>,
    stroke: Option<Stroke>,
    radius: Option<f32>,
}

impl CountdownDial {
    #[must_use]
    pub const fn new(remaining: u32, total: u32) -> Self {
        Self {
            remaining,
            total,
            hand_color: None,
            fill: None,
            stroke: None,
            radius: None,
        }
    }

    #[must_use]
    pub fn hand_color(mut self, color: Color32) -> Self {
        self.hand_color = Some(color);
        self
    }

    #[must_use]
    pub fn radius(mut self, radius: f32) -> Self {
        self.radius = Some(radius);
        self
    }

    /// Portion of the countdown left, between 0 and 1.
    #[must_use]
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            return 0.;
        }
        #[allow(clippy::cast_precision_loss)]
        let fraction = self.remaining.min(self.total) as f32 / self.total as f32;
        fraction
    }
}

impl Widget for CountdownDial {
    fn ui(self, ui: &mut eframe::egui::Ui) -> eframe::egui::Response {
        let desired_radius = self.radius.unwrap_or_else(|| ui.spacing().slider_width / 2.);
        let (rect, response) =
            ui.allocate_exact_size(Vec2::splat(desired_radius * 2.), Sense::hover());
        let visuals = ui.style().interact(&response);
        ui.painter().circle_filled(
            rect.center(),
            desired_radius,
            self.fill.unwrap_or(visuals.bg_fill),
        );
        let border_stroke = self.stroke.unwrap_or(visuals.fg_stroke);
        ui.painter()
            .circle_stroke(rect.center(), desired_radius, border_stroke);

        // full countdown points straight up, like a clock at twelve,
        // and the hand walks backwards from there
        let angle = 360f32.mul_add(self.fraction(), -90.);
        let pointer = rect.center() + Vec2::angled(angle.to_radians()) * desired_radius;
        let mut hand_stroke = visuals.fg_stroke;
        if let Some(color) = self.hand_color {
            hand_stroke.color = color;
        }
        ui.painter()
            .line_segment([rect.center(), pointer], hand_stroke);
        ui.painter().text(
            rect.center(),
            Align2::CENTER_CENTER,
            self.remaining.to_string(),
            FontId::proportional(desired_radius * 0.6),
            self.hand_color.unwrap_or(visuals.fg_stroke.color),
        );
        response
    }
}
