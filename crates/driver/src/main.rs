mod osc;
mod parameter;
mod protocol;
mod query;
mod self_test;
mod settings;
mod tree;

use crate::osc::OscServer;
use crate::protocol::C24Protocol;
use crate::query::QueryServer;
use crate::self_test::self_test;
use crate::settings::Settings;
use crate::tree::Tree;
use c24_library::sim::SimSurface;
use c24_library::surface::Surface;
use clap::Parser;
use config::Config;
use log::info;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::{thread, time};

#[derive(Parser, Debug)]
#[clap(
    name = "Control|24 OSC bridge",
    version = env!("CARGO_PKG_VERSION"),
)]
struct Args {
    #[clap(help = "UDP port of the OSC endpoint (overrides the config file)")]
    osc_port: Option<u16>,

    #[clap(help = "TCP port of the namespace query endpoint (overrides the config file)")]
    query_port: Option<u16>,

    #[clap(short, long, help = "Config file (see example_config.toml)")]
    config: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let mut cfg = Config::builder();
    if let Some(config_fn) = args.config {
        cfg = cfg.add_source(config::File::with_name(config_fn.as_str()));
    }
    let cfg = cfg.build()?;

    let mut settings: Settings = cfg.try_deserialize()?;
    if let Some(port) = args.osc_port {
        settings.osc_port = port;
    }
    if let Some(port) = args.query_port {
        settings.query_port = port;
    }
    settings.validate()?;
    info!("running with settings: {settings:?}");

    let tree = Arc::new(Tree::new());

    // A missing or busy device is fatal; nothing gets bound.
    let surface = SimSurface::open(settings.surface_capacity)?;
    let surface_dyn: Arc<dyn Surface> = surface.clone();

    let protocol = C24Protocol::bind(Arc::clone(&surface_dyn), &tree)?;
    surface.set_event_handler(protocol.clone());
    tree.set_device_protocol(protocol.clone());

    if settings.self_test {
        self_test(&surface_dyn);
        protocol.resync();
    }

    let osc = OscServer::bind(settings.osc_port, Arc::clone(&tree), protocol.clone())?;
    osc.start()?;
    let query = QueryServer::bind(settings.query_port, Arc::clone(&tree))?;
    query.start()?;

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))?;
    }

    while running.load(Ordering::SeqCst) {
        thread::sleep(time::Duration::from_secs(1));
    }

    info!("quitting");
    osc.stop();
    query.stop();
    surface.close();

    Ok(())
}
