use std::time::Duration;

use chrono::Local;
use eframe::egui;
use egui::{Align2, Color32, FontId, Pos2, Rect, Sense, Stroke, Vec2};

use crate::config::{
    AppConfig, MAX_DURATION_SECS, MAX_FOLLOW_WINDOW_SECS, MAX_INTERVAL_SECS, MIN_DURATION_SECS,
    MIN_FOLLOW_WINDOW_SECS, MIN_INTERVAL_SECS, ProbeBackend,
};
use crate::export::default_file_name;
use crate::ping_executor::Prober;
use crate::quality::Quality;
use crate::session::{PingSession, SessionEvent};
use crate::view::{self, ViewDecision, ViewRange};

const CHART_LINE: Color32 = Color32::from_rgb(0x4A, 0x90, 0xE2);
const CHART_GRID: Color32 = Color32::from_gray(70);
const CHART_TEXT: Color32 = Color32::from_gray(200);
const AXIS_MARGIN_LEFT: f32 = 48.0;
const AXIS_MARGIN_BOTTOM: f32 = 22.0;
const HOVER_TOLERANCE: f64 = 0.05;
const CONNECTION_ISSUE: &str = "Connection Issue";

struct StatusMessage {
    success: bool,
    text: String,
}

pub struct PingPlotterApp {
    config: AppConfig,
    session: PingSession<Prober>,
    range: ViewRange,
    status: Option<StatusMessage>,
}

impl Default for PingPlotterApp {
    fn default() -> Self {
        Self::with_config(AppConfig::default())
    }
}

impl PingPlotterApp {
    pub fn new() -> Self {
        Self::with_config(AppConfig::load())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let config = config.validated();
        let session = PingSession::new(Prober::from_backend(config.probe_backend), config.follow_window_secs);
        Self {
            config,
            session,
            range: ViewRange::EMPTY,
            status: None,
        }
    }

    fn start(&mut self) {
        let duration = Duration::from_secs(self.config.duration_secs);
        match self
            .session
            .start(&self.config.target, self.config.interval_secs, Some(duration))
        {
            Ok(()) => self.status = None,
            Err(e) => self.set_status(false, e.to_string()),
        }
    }

    fn export(&mut self) {
        let path = self.config.export_dir().join(default_file_name(Local::now()));
        match self.session.export_csv(&path) {
            Ok(()) => self.set_status(true, format!("Ping data exported to {}", path.display())),
            Err(e) => self.set_status(false, format!("Failed to export data: {e}")),
        }
    }

    fn set_status(&mut self, success: bool, text: String) {
        self.status = Some(StatusMessage { success, text });
    }

    fn set_probe_backend(&mut self, backend: ProbeBackend) {
        if self.session.is_running() || backend == self.config.probe_backend {
            return;
        }
        self.config.probe_backend = backend;
        self.session = PingSession::new(Prober::from_backend(backend), self.config.follow_window_secs);
        self.range = ViewRange::EMPTY;
    }

    fn handle_events(&mut self) {
        for event in self.session.poll() {
            match event {
                SessionEvent::Sample(_) | SessionEvent::Failure => {}
                SessionEvent::AutoStopped => self.set_status(true, "Test finished".to_string()),
                SessionEvent::Stopped => self.set_status(false, "Ping loop stopped unexpectedly".to_string()),
                SessionEvent::Connectivity(report) => self.set_status(report.success, report.message),
            }
        }
    }

    fn apply_view_decision(&mut self) {
        match self.session.view_decision() {
            ViewDecision::Follow(range) => self.range = range,
            ViewDecision::AutoFit => self.range = view::fit_range(self.session.samples()),
            ViewDecision::Keep => {}
        }
    }

    fn draw_controls(&mut self, ui: &mut egui::Ui) {
        let running = self.session.is_running();

        egui::Grid::new("controls").num_columns(2).show(ui, |ui| {
            ui.label("Target:");
            ui.add_enabled(!running, egui::TextEdit::singleline(&mut self.config.target));
            ui.end_row();

            ui.label("Interval:");
            ui.add_enabled(
                !running,
                egui::DragValue::new(&mut self.config.interval_secs)
                    .range(MIN_INTERVAL_SECS..=MAX_INTERVAL_SECS)
                    .speed(0.1)
                    .suffix(" s"),
            );
            ui.end_row();

            ui.label("Test duration:");
            ui.add_enabled(
                !running,
                egui::DragValue::new(&mut self.config.duration_secs)
                    .range(MIN_DURATION_SECS..=MAX_DURATION_SECS)
                    .suffix(" s"),
            );
            ui.end_row();
        });

        ui.horizontal(|ui| {
            if ui.add_enabled(!running, egui::Button::new("Start")).clicked() {
                self.start();
            }
            if ui.add_enabled(running, egui::Button::new("Stop")).clicked() {
                self.session.stop();
            }
            if ui.button("Clear").clicked() {
                self.session.clear();
                self.range = ViewRange::EMPTY;
            }
            let testing = self.session.connectivity_in_progress();
            let label = if testing { "Testing..." } else { "Test Network" };
            if ui.add_enabled(!testing, egui::Button::new(label)).clicked() {
                self.session.test_connectivity();
            }
            if ui
                .add_enabled(self.session.has_data(), egui::Button::new("Export CSV"))
                .clicked()
            {
                self.export();
            }
        });

        egui::CollapsingHeader::new("Settings").show(ui, |ui| {
            ui.checkbox(&mut self.config.show_advanced_stats, "Show advanced statistics");
            ui.checkbox(&mut self.config.show_graph_controls, "Show graph controls");

            let mut backend = self.config.probe_backend;
            ui.add_enabled_ui(!running, |ui| {
                egui::ComboBox::from_label("Probe")
                    .selected_text(match backend {
                        ProbeBackend::System => "System ping",
                        ProbeBackend::Icmp => "ICMP socket",
                    })
                    .show_ui(ui, |ui| {
                        ui.selectable_value(&mut backend, ProbeBackend::System, "System ping");
                        ui.selectable_value(&mut backend, ProbeBackend::Icmp, "ICMP socket");
                    });
            });
            self.set_probe_backend(backend);
        });

        if self.config.show_graph_controls {
            ui.horizontal(|ui| {
                let mut follow = self.session.view().follow_mode();
                if ui.checkbox(&mut follow, "Follow").changed() {
                    self.session.set_follow_mode(follow);
                }
                ui.add_enabled(
                    follow,
                    egui::DragValue::new(&mut self.config.follow_window_secs)
                        .range(MIN_FOLLOW_WINDOW_SECS..=MAX_FOLLOW_WINDOW_SECS)
                        .suffix(" s window"),
                );
                if self.config.follow_window_secs != self.session.view().follow_window_secs() {
                    self.session.set_follow_window(self.config.follow_window_secs);
                }
                if ui.button("Reset View").clicked() {
                    self.session.reset_view();
                }
            });
        }

        if let Some(status) = &self.status {
            let color = if status.success { Color32::GREEN } else { Color32::RED };
            ui.colored_label(color, &status.text);
        }
    }

    fn draw_statistics(&self, ui: &mut egui::Ui) {
        let basic = self.session.basic_statistics();

        ui.horizontal(|ui| {
            ui.label(format!("Current: {:.1} ms", basic.current_latency));
            ui.separator();
            ui.label(format!("Average: {:.1} ms", basic.average_latency));
            ui.separator();
            ui.label(format!("Packet Loss: {:.1}%", basic.packet_loss_percent));
            ui.separator();
            ui.label(format!("Pings: {}", basic.sample_count));
        });

        if self.config.show_advanced_stats {
            let advanced = self.session.advanced_statistics();
            ui.horizontal(|ui| {
                ui.label(format!("Min: {:.1} ms", advanced.min_latency));
                ui.separator();
                ui.label(format!("Max: {:.1} ms", advanced.max_latency));
                ui.separator();
                ui.label(format!("Jitter: {:.1} ms", advanced.jitter));
                ui.separator();
                if self.session.connection_issue() {
                    ui.colored_label(Quality::Poor.to_color32(), CONNECTION_ISSUE);
                } else if !self.session.has_data() {
                    ui.colored_label(Color32::GRAY, "Ready");
                } else {
                    let quality = self.session.quality_label(basic.current_latency);
                    ui.colored_label(quality.to_color32(), quality.label());
                }
                if let Some(left) = self.session.remaining() {
                    ui.separator();
                    ui.label(format!("Remaining: {} s", left.as_secs()));
                }
            });
        }
    }

    fn draw_chart(&mut self, ui: &mut egui::Ui) {
        let size = Vec2::new(ui.available_width(), ui.available_height().max(200.0));
        let (response, painter) = ui.allocate_painter(size, Sense::click_and_drag());
        let plot = Rect::from_min_max(
            response.rect.min + Vec2::new(AXIS_MARGIN_LEFT, 4.0),
            response.rect.max - Vec2::new(8.0, AXIS_MARGIN_BOTTOM),
        );
        let x_span = (self.range.x_max - self.range.x_min).max(f64::EPSILON);
        let y_span = (self.range.y_max - self.range.y_min).max(f64::EPSILON);

        let mut moved = false;
        if response.dragged() {
            let delta = response.drag_delta();
            let dx = -f64::from(delta.x) / f64::from(plot.width()) * x_span;
            let dy = f64::from(delta.y) / f64::from(plot.height()) * y_span;
            self.range.x_min += dx;
            self.range.x_max += dx;
            self.range.y_min += dy;
            self.range.y_max += dy;
            moved = dx != 0.0 || dy != 0.0;
        }
        if response.hovered() {
            let scroll = ui.input(|i| i.smooth_scroll_delta.y);
            if scroll != 0.0 {
                let factor = f64::from(-scroll * 0.002).exp();
                let center = (self.range.x_min + self.range.x_max) / 2.0;
                self.range.x_min = center - (center - self.range.x_min) * factor;
                self.range.x_max = center + (self.range.x_max - center) * factor;
                moved = true;
            }
        }
        if response.double_clicked() {
            self.session.reset_view();
        } else if moved {
            self.session.on_manual_view_change(self.range.x_max);
        }

        let range = self.range;
        let to_screen = |x: f64, y: f64| -> Pos2 {
            let fx = ((x - range.x_min) / x_span) as f32;
            let fy = ((y - range.y_min) / y_span) as f32;
            Pos2::new(plot.left() + fx * plot.width(), plot.bottom() - fy * plot.height())
        };

        for i in 0..=4 {
            let value = range.y_min + y_span * f64::from(i) / 4.0;
            let y = to_screen(range.x_min, value).y;
            painter.line_segment([Pos2::new(plot.left(), y), Pos2::new(plot.right(), y)], Stroke::new(1.0, CHART_GRID));
            painter.text(
                Pos2::new(plot.left() - 4.0, y),
                Align2::RIGHT_CENTER,
                format!("{value:.0} ms"),
                FontId::proportional(11.0),
                CHART_TEXT,
            );

            let seconds = range.x_min + x_span * f64::from(i) / 4.0;
            let x = to_screen(seconds, range.y_min).x;
            painter.text(
                Pos2::new(x, plot.bottom() + 4.0),
                Align2::CENTER_TOP,
                format!("{seconds:.0}s"),
                FontId::proportional(11.0),
                CHART_TEXT,
            );
        }

        let clipped = painter.with_clip_rect(plot);
        let points: Vec<Pos2> = self
            .session
            .samples()
            .map(|s| to_screen(s.elapsed_s, s.latency_ms))
            .collect();
        if points.len() > 1 {
            clipped.line(points.clone(), Stroke::new(2.0, CHART_LINE));
        }
        for point in &points {
            clipped.circle_filled(*point, 3.0, CHART_LINE);
        }

        if let Some(pointer) = response.hover_pos().filter(|p| plot.contains(*p)) {
            let pointer_x = range.x_min + f64::from((pointer.x - plot.left()) / plot.width()) * x_span;
            let pointer_y = range.y_min + f64::from((plot.bottom() - pointer.y) / plot.height()) * y_span;
            let nearest = self.session.samples().min_by(|a, b| {
                (a.elapsed_s - pointer_x).abs().total_cmp(&(b.elapsed_s - pointer_x).abs())
            });

            if let Some(sample) = nearest.filter(|s| {
                (s.elapsed_s - pointer_x).abs() <= x_span * HOVER_TOLERANCE
                    && (s.latency_ms - pointer_y).abs() <= y_span * HOVER_TOLERANCE
            }) {
                let time = match self.session.wall_clock_at(sample.elapsed_s) {
                    Some(at) => at.format("%H:%M:%S").to_string(),
                    None => format!("{:.1}s", sample.elapsed_s),
                };
                painter.text(
                    to_screen(sample.elapsed_s, sample.latency_ms) + Vec2::new(8.0, -8.0),
                    Align2::LEFT_BOTTOM,
                    format!("{time}  {:.1} ms", sample.latency_ms),
                    FontId::proportional(12.0),
                    Color32::WHITE,
                );
            }
        }
    }
}

impl eframe::App for PingPlotterApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let previous_config = self.config.clone();

        self.handle_events();
        self.apply_view_decision();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Ping Plotter");
            self.draw_controls(ui);
            ui.separator();
            self.draw_statistics(ui);
            ui.separator();
            self.draw_chart(ui);
        });

        if previous_config != self.config {
            if let Err(e) = self.config.save() {
                log::warn!("Failed to save config: {e}");
            }
        }

        ctx.request_repaint_after(Duration::from_millis(100));
    }
}
