use admin_control_plane::{ChannelSink, ControlPlaneConfig, Controller, LogContext, ServerResult};
use std::env;
use std::path::Path;
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};

fn main() -> ServerResult<()> {
    // Parse command-line arguments
    let args: Vec<String> = env::args().collect();
    let config = if args.len() > 1 && Path::new(&args[1]).exists() {
        ControlPlaneConfig::from_json_file(&args[1])?
    } else {
        ControlPlaneConfig::new()
    };

    // One logger for the whole process, handed out explicitly
    let level = config.level_filter();
    let logger = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .build();
    let log = LogContext::new(Arc::new(logger), level);

    // Stand-in for the voice server's client registry: drain and report
    let (sink, mut commands) = ChannelSink::new();
    let registry_log = log.scoped("admin_control_plane::registry");
    let registry = thread::spawn(move || {
        while let Some(command) = commands.blocking_recv() {
            registry_log.info(format_args!(
                "Enforcing {} for user ID: {}",
                command.action, command.user_id
            ));
        }
    });

    let controller = Controller::new(config, Arc::new(sink), log.clone());
    controller.start()?;

    let (stop_tx, stop_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })
    .map_err(|e| admin_control_plane::ServerError::Runtime(format!("failed to install Ctrl-C handler: {}", e)))?;

    let _ = stop_rx.recv();
    log.info(format_args!("Received shutdown signal"));
    controller.stop();

    // Dropping the controller drops the last sender, ending the registry thread
    drop(controller);
    join_registry(registry, &log);
    log.flush();

    Ok(())
}

fn join_registry(registry: JoinHandle<()>, log: &LogContext) {
    if registry.join().is_err() {
        log.error(format_args!("Moderation registry thread panicked"));
    }
}
