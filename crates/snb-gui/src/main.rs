use chrono::{DateTime, Local};
use eframe::{App, egui};
use egui::{ColorImage, TextureHandle};
use snb_core::{Created, Error, Paths, Session, SlotState, SnapshotRef, Thumbnail, View};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

enum Job {
    Create,
    Load(SnapshotRef),
}

enum JobResult {
    Created(snb_core::Result<Created>),
    Loaded(snb_core::Result<SnapshotRef>),
}

#[derive(Default)]
struct State {
    view: View,
    textures: HashMap<(String, String), TextureHandle>,
    seen_generation: u64,
    auto_backup: bool,
    interval_text: String,
    status: String,
    confirm_load: Option<SnapshotRef>,
    busy: Option<Receiver<JobResult>>,
    last_backup_time: Option<DateTime<Local>>,
}

struct AppGui {
    session: Session,
    backup_dir: PathBuf,
    state: State,
}

impl AppGui {
    fn new(_cc: &eframe::CreationContext<'_>, session: Session, backup_dir: PathBuf) -> Self {
        let settings = session.settings();
        let mut app = Self {
            state: State {
                auto_backup: session.auto_backup_enabled(),
                interval_text: settings.auto_backup_interval.to_string(),
                ..Default::default()
            },
            session,
            backup_dir,
        };
        app.refresh_view();
        app
    }

    fn refresh_view(&mut self) {
        self.state.seen_generation = self.session.backups().generation();
        self.state.textures.clear();
        match self.session.build_view() {
            Ok(view) => {
                if let Some(sel) = self.session.selected()
                    && !view.snapshots.iter().any(|s| s.path == sel.path)
                {
                    self.session.select(None);
                }
                if !view.skipped.is_empty() {
                    self.state.status = format!("{} unreadable backup(s) skipped", view.skipped.len());
                }
                self.state.view = view;
            }
            Err(e) => self.state.status = format!("Error reading backups: {}", e),
        }
    }

    fn spawn_job(&mut self, ctx: &egui::Context, job: Job) {
        let backups = Arc::clone(self.session.backups());
        let (tx, rx) = mpsc::channel();
        let ctx = ctx.clone();
        let spawned = std::thread::Builder::new().name("backup-job".into()).spawn(move || {
            let res = match job {
                Job::Create => JobResult::Created(backups.create_snapshot()),
                Job::Load(snap) => JobResult::Loaded(backups.restore(&snap).map(|()| snap)),
            };
            let _ = tx.send(res);
            ctx.request_repaint();
        });
        match spawned {
            Ok(_) => self.state.busy = Some(rx),
            Err(e) => self.state.status = format!("Could not start worker: {}", e),
        }
    }

    fn poll_job(&mut self) {
        let Some(polled) = self.state.busy.as_ref().map(Receiver::try_recv) else {
            return;
        };
        match polled {
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                self.state.busy = None;
                self.state.status = "Backup worker stopped unexpectedly".into();
            }
            Ok(JobResult::Created(res)) => {
                self.state.busy = None;
                match res {
                    Ok(created) => {
                        self.state.status = format!("Created {}", created.snapshot.name());
                        if let Some(e) = created.counter_error {
                            self.state.status.push_str(&format!(" (warning: {})", e));
                        }
                    }
                    Err(e) => self.state.status = describe_error("Backup error", &e),
                }
            }
            Ok(JobResult::Loaded(res)) => {
                self.state.busy = None;
                self.state.status = match res {
                    Ok(snap) => format!("Backup {} loaded!", snap.name()),
                    Err(e) => describe_error("Failed to load backup", &e),
                };
            }
        }
    }

    fn poll_auto_failure(&mut self) {
        if let Some(e) = self.session.backups().take_auto_failure() {
            self.state.status = describe_error("Auto backup error", &e);
        }
    }

    fn poll_generation(&mut self) {
        let generation = self.session.backups().generation();
        if generation != self.state.seen_generation {
            self.state.last_backup_time = Some(Local::now());
            self.refresh_view();
        }
    }

    fn toggle_auto_backup(&mut self) {
        match self
            .session
            .set_auto_backup(self.state.auto_backup, &self.state.interval_text)
        {
            Ok(()) => {
                self.state.status = match self.session.timer_state() {
                    snb_core::TimerState::Enabled(i) => format!("Auto backup every {}", i),
                    snb_core::TimerState::Disabled => "Auto backup off".into(),
                };
            }
            Err(e) => {
                self.state.auto_backup = false;
                self.state.status = format!("Invalid Input: {}", e);
            }
        }
    }

    fn pick_source_dir(&mut self) {
        let start = self.session.backups().source_dir().to_path_buf();
        let Some(dir) = rfd::FileDialog::new().set_directory(&start).pick_folder() else {
            return;
        };
        // Both sessions share the ledger, so the old timer stops first.
        self.session.shutdown();
        match Session::open(Paths::new(dir, &self.backup_dir)) {
            Ok(session) => {
                info!("save folder set to {}", session.backups().source_dir().display());
                self.state.status =
                    format!("Save folder: {}", session.backups().source_dir().display());
                self.session = session;
                self.refresh_view();
            }
            Err(e) => {
                self.session.resume_auto_backup();
                self.state.status = format!("Could not open save folder: {}", e);
            }
        }
        self.state.auto_backup = self.session.auto_backup_enabled();
    }

    fn thumbnail_texture(
        textures: &mut HashMap<(String, String), TextureHandle>,
        ctx: &egui::Context,
        snapshot: &str,
        slot: &str,
        thumb: &Thumbnail,
    ) -> TextureHandle {
        textures
            .entry((snapshot.to_string(), slot.to_string()))
            .or_insert_with(|| {
                let img = ColorImage::from_rgba_unmultiplied(
                    [thumb.width as usize, thumb.height as usize],
                    &thumb.rgba,
                );
                ctx.load_texture(format!("{}-{}", snapshot, slot), img, egui::TextureOptions::LINEAR)
            })
            .clone()
    }
}

fn describe_error(what: &str, e: &Error) -> String {
    match e {
        Error::NotFound { path } if path.extension().is_none() => format!(
            "{}: source folder not found: {} (SN is probably not installed)",
            what,
            path.display()
        ),
        _ => format!("{}: {}", what, e),
    }
}

impl App for AppGui {
    fn update(&mut self, ctx: &egui::Context, _: &mut eframe::Frame) {
        self.poll_job();
        self.poll_generation();
        self.poll_auto_failure();
        if self.session.auto_backup_enabled() {
            ctx.request_repaint_after(Duration::from_secs(1));
        }

        egui::TopBottomPanel::top("top").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let busy = self.state.busy.is_some();
                if ui.add_enabled(!busy, egui::Button::new("Create Backup")).clicked() {
                    self.spawn_job(ctx, Job::Create);
                }
                let can_load = !busy && self.session.selected().is_some();
                if ui.add_enabled(can_load, egui::Button::new("Load Backup")).clicked() {
                    self.state.confirm_load = self.session.selected().cloned();
                }
                if ui.add_enabled(!busy, egui::Button::new("Open Save Folder")).clicked() {
                    self.pick_source_dir();
                }
                if ui.button("Refresh").clicked() {
                    self.refresh_view();
                }
                if busy {
                    ui.spinner();
                }
            });
        });

        egui::TopBottomPanel::bottom("bottom").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let toggled = ui.checkbox(&mut self.state.auto_backup, "Auto Backup").changed();
                ui.label("Interval (min):");
                ui.add(egui::TextEdit::singleline(&mut self.state.interval_text).desired_width(40.0));
                if toggled {
                    self.toggle_auto_backup();
                }
                ui.separator();
                if let Some(time) = self.state.last_backup_time {
                    ui.label(format!("Last backup: {}", time.format("%Y-%m-%d %H:%M:%S")));
                    ui.separator();
                }
                ui.label(&self.state.status);
            });
        });

        if let Some(snap) = self.state.confirm_load.clone() {
            let name = snap.name();
            egui::Window::new("Confirm Load")
                .collapsible(false)
                .resizable(false)
                .show(ctx, |ui| {
                    ui.label(format!(
                        "Are you sure you want to load:\n{}?\nThis will overwrite your current save.",
                        name
                    ));
                    ui.horizontal(|ui| {
                        if ui.button("Yes").clicked() {
                            self.state.confirm_load = None;
                            self.spawn_job(ctx, Job::Load(snap.clone()));
                        }
                        if ui.button("No").clicked() {
                            self.state.confirm_load = None;
                        }
                    });
                });
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            let selected = self.session.selected().map(|s| s.path.clone());
            let mut clicked: Option<SnapshotRef> = None;
            let State { view, textures, .. } = &mut self.state;
            if view.snapshots.is_empty() {
                ui.label("No backups yet");
            }
            egui::ScrollArea::both().show(ui, |ui| {
                egui::Grid::new("snapshots")
                    .striped(true)
                    .spacing([10.0, 6.0])
                    .show(ui, |ui| {
                        ui.strong("Save File");
                        ui.strong("Last Modified");
                        for slot in &view.slots {
                            ui.strong(slot);
                        }
                        ui.end_row();

                        for snap in &view.snapshots {
                            let sel = selected.as_ref() == Some(&snap.path);
                            if ui.selectable_label(sel, &snap.name).clicked() {
                                clicked = Some(snap.snapshot_ref());
                            }
                            if ui.selectable_label(sel, snap.modified_display()).clicked() {
                                clicked = Some(snap.snapshot_ref());
                            }
                            for slot in &view.slots {
                                let resp = match snap.slot(slot) {
                                    SlotState::Image(thumb) => {
                                        let tex = Self::thumbnail_texture(
                                            textures, ctx, &snap.name, slot, thumb,
                                        );
                                        let image = egui::Image::new((tex.id(), tex.size_vec2()))
                                            .sense(egui::Sense::click());
                                        if sel {
                                            egui::Frame::none()
                                                .fill(ui.visuals().selection.bg_fill)
                                                .inner_margin(2.0)
                                                .show(ui, |ui| ui.add(image))
                                                .inner
                                        } else {
                                            ui.add(image)
                                        }
                                    }
                                    SlotState::Missing => ui.selectable_label(sel, "[No Img]"),
                                    SlotState::Undecodable(err) => {
                                        ui.selectable_label(sel, "[Img Err]").on_hover_text(err)
                                    }
                                };
                                if resp.clicked() {
                                    clicked = Some(snap.snapshot_ref());
                                }
                            }
                            ui.end_row();
                        }
                    });
            });
            if let Some(snap) = clicked {
                self.session.select(Some(snap));
            }
        });
    }
}

impl Drop for AppGui {
    fn drop(&mut self) {
        self.session.shutdown();
    }
}

fn main() -> eframe::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let paths = match Paths::detect(None, None) {
        Ok(p) => p,
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    };
    let backup_dir = paths.backup_dir.clone();
    let session = match Session::open(paths) {
        Ok(s) => s,
        Err(e) => {
            error!("could not open backup folder: {}", e);
            std::process::exit(2);
        }
    };

    let native_options = eframe::NativeOptions {
        viewport: egui::viewport::ViewportBuilder::default()
            .with_inner_size([1000.0, 700.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Subnautica Save Viewer",
        native_options,
        Box::new(move |cc| Ok(Box::new(AppGui::new(cc, session, backup_dir)))),
    )
}
