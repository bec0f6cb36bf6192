//! Device sessions behind each subcommand

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use avlink::{
    ChannelKind, DeviceStatus, Projector, ProjectorConfig, Receiver, ReceiverConfig, StateCache,
};

use crate::output;
use crate::{ProjectorAction, ReceiverAction};

/// How long to wait for the first state after connecting
const SETTLE_TIMEOUT: Duration = Duration::from_secs(3);

/// Quiet period that ends the initial zone sync
const SETTLE_QUIET: Duration = Duration::from_millis(500);

/// How long `send` waits for the device to report the new value
const ECHO_TIMEOUT: Duration = Duration::from_secs(2);

pub fn run_receiver(config: &ReceiverConfig, action: ReceiverAction, json: bool) -> Result<()> {
    let receiver = Receiver::new(config).context("Failed to create receiver")?;
    let cache = Arc::new(StateCache::new());
    receiver.add_listener(cache.clone());

    let result = match action {
        ReceiverAction::Status => {
            receiver.initialize();
            settle(&cache);
            ensure_online(cache.status(), receiver.connection().endpoint())?;
            output::print_state(&cache.snapshot(), json)
        }
        ReceiverAction::Send {
            channel,
            zone,
            value,
        } => {
            info!("Sending {} to zone {} {}", value, zone, channel);
            receiver.handle_command(channel, zone, value)?;
            echo(&cache, channel, zone, json)
        }
        ReceiverAction::Watch => {
            receiver.initialize();
            watch(&cache, json)
        }
    };

    receiver.close();
    result
}

pub fn run_projector(config: &ProjectorConfig, action: ProjectorAction, json: bool) -> Result<()> {
    let projector = Projector::new(config).context("Failed to create projector")?;
    let cache = Arc::new(StateCache::new());
    projector.add_listener(cache.clone());

    let result = match action {
        ProjectorAction::Status => {
            projector.initialize()?;
            for channel in [
                ChannelKind::Power,
                ChannelKind::AudioMute,
                ChannelKind::InputSource,
            ] {
                if let Err(e) = projector.refresh(channel) {
                    warn!("Failed to read {}: {}", channel, e);
                }
            }
            settle(&cache);
            output::print_state(&cache.snapshot(), json)
        }
        ProjectorAction::Info => {
            let info = projector.identify()?;
            let lamps = projector.lamps()?;
            let inputs = projector.inputs()?;
            let errors = projector.error_status()?;
            output::print_projector_info(&info, &lamps, &inputs, &errors, json)
        }
        ProjectorAction::Send { channel, value } => {
            info!("Sending {} to projector {}", value, channel);
            projector.handle_command(channel, value)?;
            echo(&cache, channel, 1, json)
        }
        ProjectorAction::Watch => {
            if let Err(e) = projector.initialize() {
                warn!("Projector not reachable yet: {}", e);
            }
            watch(&cache, json)
        }
    };

    projector.close();
    result
}

/// Wait until the first value arrives and updates stop for a moment
fn settle(cache: &StateCache) {
    let changes = cache.iter();
    if changes.recv_timeout(SETTLE_TIMEOUT).is_none() {
        return;
    }
    while changes.recv_timeout(SETTLE_QUIET).is_some() {}
}

fn ensure_online(status: DeviceStatus, endpoint: &str) -> Result<()> {
    if status == DeviceStatus::Offline {
        anyhow::bail!("Device at {} is offline", endpoint);
    }
    Ok(())
}

fn echo(cache: &StateCache, channel: ChannelKind, zone: u8, json: bool) -> Result<()> {
    match cache.wait_for(channel, zone, ECHO_TIMEOUT) {
        Some(value) => output::print_update(&avlink::StateUpdate::new(channel, zone, value), json),
        None => {
            info!("No update reported for zone {} {}", zone, channel);
            Ok(())
        }
    }
}

fn watch(cache: &StateCache, json: bool) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl+C handler")?;

    if !json {
        println!("Watching for changes (Ctrl+C to quit)...");
    }

    let changes = cache.iter();
    while running.load(Ordering::SeqCst) {
        if let Some(update) = changes.recv_timeout(Duration::from_secs(1)) {
            output::print_update(&update, json)?;
        }
    }

    info!("Stopped watching");
    Ok(())
}
