use std::{net::SocketAddr, process::ExitCode};

use stamp_sender::{
    configuration::{Configuration, Parser},
    sender::{connect_socket, resolve_remote, SessionSender},
    stats::StatsSnapshot,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::init();

    let conf = Configuration::parse();
    if let Err(e) = conf.validate() {
        log::error!("Configuration is broken: {}", e);
        return ExitCode::FAILURE;
    }

    log::info!("Configuration valid. Starting up...");

    let local_addr: SocketAddr = (conf.local_addr, conf.local_port).into();
    let remote_addr = match resolve_remote(&conf.remote_addr, conf.remote_port, &local_addr).await
    {
        Ok(addr) => addr,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let socket = match connect_socket(local_addr, remote_addr).await {
        Ok(s) => s,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let sender_conf = conf.sender_config();
    log::info!(
        "Sending {} STAMP packets to {} every {:?}",
        sender_conf.count,
        remote_addr,
        sender_conf.interval
    );

    let sender = SessionSender::new(socket, sender_conf);
    let result = sender.run().await;
    // Socket closes here, before reporting.
    drop(sender);

    StatsSnapshot::from_exchange(&result).print(conf.output_format);
    ExitCode::SUCCESS
}
