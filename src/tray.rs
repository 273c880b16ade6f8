//! System tray
//!
//! A StatusNotifier item whose menu issues discrete commands over an mpsc
//! channel; the tick loop drains the channel once per tick and owns all the
//! resulting config mutation. The tray never calls into the controller.
//! ksni needs an async runtime, so the service runs on its own thread with
//! a current-thread tokio runtime.

use anyhow::{Context, Result};
use ksni::menu::{CheckmarkItem, RadioGroup, RadioItem, StandardItem, SubMenu};
use ksni::{Icon, MenuItem, TrayMethods};
use std::path::Path;
use std::sync::mpsc::Sender;
use std::thread;
use tracing::{error, info, warn};

use crate::animation::decode_first_frame;
use crate::behavior::BehaviorMode;
use crate::config::PetConfig;
use crate::constants::scale;

/// Commands consumed by the tick loop, one channel drain per tick
#[derive(Debug, Clone, PartialEq)]
pub enum PetCommand {
    ToggleFollow,
    ToggleClickThrough,
    ToggleAutostart,
    SetBehaviorMode(BehaviorMode),
    SetScale(usize),
    SetOpacity(usize),
    OpenConfig,
    CheckUpdates,
    /// Posted back by the update checker thread
    UpdateAvailable(String),
    Quit,
}

pub struct PetTray {
    sender: Sender<PetCommand>,
    /// Last config snapshot pushed from the tick loop; drives checkbox state
    config: PetConfig,
    icon: Option<Icon>,
    update_available: Option<String>,
}

impl PetTray {
    pub fn new(sender: Sender<PetCommand>, config: PetConfig, icon_path: &Path) -> Self {
        let icon = match decode_first_frame(icon_path) {
            Ok(frame) => Some(Icon {
                width: frame.width as i32,
                height: frame.height as i32,
                data: frame.data.iter().flat_map(|p| p.to_be_bytes()).collect(),
            }),
            Err(err) => {
                warn!(error = %err, "tray icon unavailable, using name-only item");
                None
            }
        };
        Self {
            sender,
            config,
            icon,
            update_available: None,
        }
    }

    fn send(&self, command: PetCommand) {
        if let Err(err) = self.sender.send(command) {
            error!(error = %err, "tick loop gone, tray command dropped");
        }
    }
}

impl ksni::Tray for PetTray {
    fn id(&self) -> String {
        "scamper".into()
    }

    fn title(&self) -> String {
        match &self.update_available {
            Some(version) => format!("Scamper ({version} available)"),
            None => "Scamper".into(),
        }
    }

    fn icon_pixmap(&self) -> Vec<Icon> {
        self.icon.clone().into_iter().collect()
    }

    fn menu(&self) -> Vec<MenuItem<Self>> {
        let behavior_selected = BehaviorMode::ALL
            .iter()
            .position(|m| *m == self.config.behavior_mode)
            .unwrap_or(1);

        vec![
            CheckmarkItem {
                label: "Follow cursor".into(),
                checked: self.config.follow_mouse,
                activate: Box::new(|this: &mut Self| {
                    this.config.follow_mouse = !this.config.follow_mouse;
                    this.send(PetCommand::ToggleFollow);
                }),
                ..Default::default()
            }
            .into(),
            CheckmarkItem {
                label: "Click-through".into(),
                checked: self.config.click_through,
                activate: Box::new(|this: &mut Self| {
                    this.config.click_through = !this.config.click_through;
                    this.send(PetCommand::ToggleClickThrough);
                }),
                ..Default::default()
            }
            .into(),
            CheckmarkItem {
                label: "Start at login".into(),
                checked: self.config.auto_startup,
                activate: Box::new(|this: &mut Self| {
                    this.config.auto_startup = !this.config.auto_startup;
                    this.send(PetCommand::ToggleAutostart);
                }),
                ..Default::default()
            }
            .into(),
            SubMenu {
                label: "Behavior".into(),
                submenu: vec![
                    RadioGroup {
                        selected: behavior_selected,
                        select: Box::new(|this: &mut Self, index| {
                            let mode = BehaviorMode::ALL[index];
                            this.config.behavior_mode = mode;
                            this.send(PetCommand::SetBehaviorMode(mode));
                        }),
                        options: BehaviorMode::ALL
                            .iter()
                            .map(|mode| RadioItem {
                                label: mode.label().into(),
                                ..Default::default()
                            })
                            .collect(),
                    }
                    .into(),
                ],
                ..Default::default()
            }
            .into(),
            SubMenu {
                label: "Size".into(),
                submenu: vec![
                    RadioGroup {
                        selected: self.config.scale_index,
                        select: Box::new(|this: &mut Self, index| {
                            this.config.scale_index = index;
                            this.send(PetCommand::SetScale(index));
                        }),
                        options: scale::SCALE_OPTIONS
                            .iter()
                            .map(|s| RadioItem {
                                label: format!("{s}x"),
                                ..Default::default()
                            })
                            .collect(),
                    }
                    .into(),
                ],
                ..Default::default()
            }
            .into(),
            SubMenu {
                label: "Opacity".into(),
                submenu: vec![
                    RadioGroup {
                        selected: self.config.opacity_index,
                        select: Box::new(|this: &mut Self, index| {
                            this.config.opacity_index = index;
                            this.send(PetCommand::SetOpacity(index));
                        }),
                        options: scale::OPACITY_OPTIONS
                            .iter()
                            .map(|o| RadioItem {
                                label: format!("{}%", (o * 100.0) as u32),
                                ..Default::default()
                            })
                            .collect(),
                    }
                    .into(),
                ],
                ..Default::default()
            }
            .into(),
            StandardItem {
                label: "Open config".into(),
                activate: Box::new(|this: &mut Self| this.send(PetCommand::OpenConfig)),
                ..Default::default()
            }
            .into(),
            StandardItem {
                label: "Check for updates".into(),
                activate: Box::new(|this: &mut Self| this.send(PetCommand::CheckUpdates)),
                ..Default::default()
            }
            .into(),
            StandardItem {
                label: "Quit".into(),
                activate: Box::new(|this: &mut Self| this.send(PetCommand::Quit)),
                ..Default::default()
            }
            .into(),
        ]
    }
}

/// Link back to the running tray service, used by the tick loop to push
/// config snapshots and update notices into the menu.
pub struct TrayLink {
    handle: ksni::Handle<PetTray>,
    rt: tokio::runtime::Handle,
}

impl TrayLink {
    pub fn sync_config(&self, config: PetConfig) {
        let _ = self
            .rt
            .block_on(self.handle.update(move |tray| tray.config = config));
    }

    pub fn notify_update(&self, version: String) {
        info!(version = %version, "newer release available");
        let _ = self
            .rt
            .block_on(self.handle.update(move |tray| {
                tray.update_available = Some(version);
            }));
    }
}

/// Run the tray service on a dedicated thread and hand back a [`TrayLink`].
/// A missing StatusNotifier host is not fatal; the pet runs without a tray.
pub fn spawn(tray: PetTray) -> Result<TrayLink> {
    let (tx, rx) = std::sync::mpsc::channel();
    thread::Builder::new()
        .name("tray".into())
        .spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(err) => {
                    error!(error = %err, "failed to build tray runtime");
                    return;
                }
            };
            let rt_handle = rt.handle().clone();
            rt.block_on(async move {
                match tray.spawn().await {
                    Ok(handle) => {
                        info!("tray service running");
                        let _ = tx.send(TrayLink {
                            handle,
                            rt: rt_handle,
                        });
                        // Keep the runtime alive for the service
                        std::future::pending::<()>().await;
                    }
                    Err(err) => {
                        error!(error = %err, "failed to register tray item");
                    }
                }
            });
        })
        .context("Failed to spawn tray thread")?;

    rx.recv_timeout(std::time::Duration::from_secs(2))
        .context("Tray service did not start")
}
