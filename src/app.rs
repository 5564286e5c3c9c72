//! egui rendering of the [`Controller`] state

use std::path::Path;

use eframe::{App, Frame, egui};
use egui::{Color32, TextureHandle, TextureOptions};
use rfd::FileDialog;

use crate::{
    controller::{Controller, NoticeKind, ThumbnailState, Tone},
    model::{Quality, format_duration},
};

/// Application state for the GUI
pub struct DownloaderApp {
    controller: Controller,
    /// Texture for the current preview thumbnail
    thumbnail: Option<TextureHandle>,
    /// Set once the close request has been handled
    closing: bool,
}

impl DownloaderApp {
    pub fn new(controller: Controller) -> Self {
        Self {
            controller,
            thumbnail: None,
            closing: false,
        }
    }

    fn preview_ui(&self, ui: &mut egui::Ui) {
        let Some(preview) = self.controller.preview() else {
            return;
        };
        ui.group(|ui| {
            ui.horizontal(|ui| {
                match (&self.thumbnail, preview.thumbnail) {
                    (Some(tex), ThumbnailState::Loaded) => {
                        ui.image(tex);
                    }
                    (_, ThumbnailState::Loading) | (None, ThumbnailState::Loaded) => {
                        ui.spinner();
                    }
                    (_, ThumbnailState::Unavailable) => {
                        ui.weak("No thumbnail available");
                    }
                }
                ui.vertical(|ui| {
                    ui.strong(&preview.metadata.title);
                    if let Some(uploader) = &preview.metadata.uploader {
                        ui.label(uploader);
                    }
                    ui.label(format!(
                        "Duration: {}",
                        format_duration(preview.metadata.duration_seconds)
                    ));
                });
            });
        });
    }

    fn notice_ui(&mut self, ctx: &egui::Context) {
        let Some(notice) = self.controller.notice() else {
            return;
        };
        let title = match notice.kind {
            NoticeKind::Success => "Success",
            NoticeKind::Error => "Error",
        };
        let mut dismissed = false;
        egui::Window::new(title)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(&notice.message);
                ui.add_space(8.0);
                if ui.button("OK").clicked() {
                    dismissed = true;
                }
            });
        if dismissed {
            self.controller.dismiss_notice();
        }
    }
}

/// GUI update loop: called each frame to redraw and handle interactions
impl App for DownloaderApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        // 1️⃣ Apply whatever the workers reported
        self.controller.pump();

        // 2️⃣ Upload a freshly decoded thumbnail, or forget a stale one
        if let Some(img) = self.controller.take_thumbnail() {
            self.thumbnail = Some(ctx.load_texture("thumbnail", img, TextureOptions::default()));
        } else if !matches!(
            self.controller.preview().map(|p| p.thumbnail),
            Some(ThumbnailState::Loaded)
        ) {
            self.thumbnail = None;
        }

        // 3️⃣ Main panel: inputs, progress, status and actions
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("YouTube Video Downloader");
            ui.add_space(12.0);

            // URL input field
            ui.horizontal(|ui| {
                ui.label("Video URL:");
                ui.add(egui::TextEdit::singleline(&mut self.controller.url).desired_width(360.0));
                let fetching = self.controller.is_fetching();
                if ui
                    .add_enabled(!fetching, egui::Button::new("Fetch Info"))
                    .clicked()
                {
                    self.controller.fetch_info();
                }
            });

            // Folder selection
            ui.horizontal(|ui| {
                ui.label("Save to:");
                ui.add(
                    egui::TextEdit::singleline(&mut self.controller.destination).desired_width(360.0),
                );
                if ui.button("Browse…").clicked() {
                    if let Some(folder) = FileDialog::new()
                        .set_directory(&self.controller.destination)
                        .pick_folder()
                    {
                        self.controller.destination = folder.display().to_string();
                    }
                }
            });

            // Quality radio buttons
            ui.horizontal(|ui| {
                ui.label("Quality:");
                for q in Quality::ALL {
                    ui.radio_value(&mut self.controller.quality, q, q.label());
                }
            });

            ui.add_space(8.0);
            self.preview_ui(ui);
            ui.add_space(8.0);

            let progress = self.controller.progress() / 100.0;
            ui.add(egui::ProgressBar::new(progress).show_percentage().animate(
                self.controller.is_downloading(),
            ));

            let status = self.controller.status();
            ui.colored_label(tone_color(status.tone), &status.text);

            ui.add_space(8.0);
            ui.horizontal(|ui| {
                let downloading = self.controller.is_downloading();
                if ui
                    .add_enabled(
                        !downloading,
                        egui::Button::new("Download").min_size(egui::vec2(160.0, 28.0)),
                    )
                    .clicked()
                {
                    self.controller.start_download();
                }
                if let Some(folder) = self.controller.finished_destination() {
                    if ui.button("Open Folder").clicked() {
                        open_folder(folder);
                    }
                }
            });
        });

        self.notice_ui(ctx);

        if !self.closing && ctx.input(|i| i.viewport().close_requested()) {
            self.closing = true;
            self.controller.shutdown();
        }
    }
}

fn tone_color(tone: Tone) -> Color32 {
    match tone {
        Tone::Ready | Tone::Success => Color32::from_rgb(80, 200, 120),
        Tone::Busy => Color32::from_rgb(90, 160, 255),
        Tone::Error => Color32::from_rgb(235, 80, 80),
    }
}

/// Opens the folder in the platform file manager, off the UI thread
fn open_folder(folder: &Path) {
    let folder = folder.to_path_buf();
    std::thread::spawn(move || {
        #[cfg(target_os = "windows")]
        let program = "explorer";
        #[cfg(target_os = "macos")]
        let program = "open";
        #[cfg(all(unix, not(target_os = "macos")))]
        let program = "xdg-open";

        if let Err(err) = std::process::Command::new(program).arg(&folder).spawn() {
            tracing::warn!("Could not open {}: {err}", folder.display());
        }
    });
}
