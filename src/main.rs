use clap::{Parser, Subcommand, ValueEnum};
use relay_gate::comm;
use relay_gate::config::Config;
use relay_gate::consts;
use relay_gate::dispatcher::Dispatcher;
use relay_gate::error::DispatchError;
use relay_gate::frame::{Channel, DesiredState};
use relay_gate::mqtt::{Initiator, TopicLayout};
use relay_gate::pins::{self, PinAdapter};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = "config.yaml")]
    config_path: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct SerialArgs {
    // Relay board UART
    #[arg(long, default_value = "/dev/ttyUSB0")]
    port_name: String,
    #[arg(long, default_value_t = consts::DEFAULT_BAUD_RATE)]
    baud_rate: u32,
}

#[derive(clap::Args, Debug)]
struct MqttArgs {
    #[arg(long)]
    mqtt_host: String,
    #[arg(long, default_value_t = 1883)]
    mqtt_port: u16,
    #[arg(long, default_value = "")]
    mqtt_username: String,
    #[arg(long, default_value = "")]
    mqtt_password: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Drive the relays from MQTT control topics.
    Run {
        #[command(flatten)]
        serial: SerialArgs,
        #[command(flatten)]
        mqtt: MqttArgs,
    },
    /// Drive the relays from `V<pin> <value>` lines on stdin.
    Pins {
        #[command(flatten)]
        serial: SerialArgs,
    },
    /// Publish a single command to a channel control topic.
    Publish {
        #[command(flatten)]
        mqtt: MqttArgs,
        #[arg(long)]
        channel: u8,
        #[arg(long, value_enum)]
        state: StateArg,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum StateArg {
    On,
    Off,
}

impl From<StateArg> for DesiredState {
    fn from(state: StateArg) -> Self {
        match state {
            StateArg::On => DesiredState::On,
            StateArg::Off => DesiredState::Off,
        }
    }
}

fn init_log() {
    let timer = fmt::time::ChronoLocal::new("%H:%M:%S%.3f".to_string());

    let format = fmt::format()
        .with_level(true)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_source_location(true)
        .with_timer(timer)
        .compact();

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::DEBUG.into())
        .from_env()
        .expect("RUST_LOG configuration is valid")
        .add_directive("rumqttc=info".parse().unwrap());

    fmt().event_format(format).with_env_filter(filter).init();
}

/// Join a serial task, turning a panic into an error.
async fn join(handle: JoinHandle<anyhow::Result<()>>) -> anyhow::Result<()> {
    handle.await?
}

async fn run(config: Config, serial: SerialArgs, mqtt: MqttArgs) -> anyhow::Result<()> {
    let layout = TopicLayout::new(&config.mqtt, &config.payload);
    let comm = comm::run(serial.port_name, serial.baud_rate)?;
    let dispatcher = Dispatcher::new(comm.tx);

    if config.reset_on_start {
        info!("Switching all relays off");
        dispatcher.all_off().await?;
    }

    let initiator = Initiator::new(
        &config.mqtt,
        &mqtt.mqtt_host,
        mqtt.mqtt_port,
        &mqtt.mqtt_username,
        &mqtt.mqtt_password,
    )
    .await?;
    let mut broker = initiator.start(layout.control_topics()).await?;

    info!("relay-gate initialized.");

    // MQTT -> UART
    let task_mqtt_to_uart = async move {
        while let Some(msg) = broker.recv().await {
            match dispatcher.dispatch(&layout, &msg).await {
                Ok(frame) => info!("Sent {:?}", frame),
                Err(DispatchError::Transport(err)) => {
                    error!("Serial link died: {}", err);
                    break;
                }
                Err(err) => warn!("Ignoring message: {}", err),
            }
        }
        // Return Err to break try_join
        info!("MQTT->UART task finishing");
        Err::<(), _>(anyhow::anyhow!("MQTT->UART task finished"))
    };

    // If any side dies (MQTT, UART reader or writer) this closes the program.
    tokio::try_join!(task_mqtt_to_uart, join(comm.reader), join(comm.writer))?;
    Ok(())
}

async fn run_pins(config: Config, serial: SerialArgs) -> anyhow::Result<()> {
    let comm = comm::run(serial.port_name, serial.baud_rate)?;
    let dispatcher = Dispatcher::new(comm.tx);

    if config.reset_on_start {
        info!("Switching all relays off");
        dispatcher.all_off().await?;
    }

    info!("Reading pin writes from stdin, eg. 'V1 1'");
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let adapter = PinAdapter::new(config.payload.unknown);
    let written = pins::run_console(stdin, &dispatcher, &adapter).await?;
    info!("Input closed after {} commands", written);

    // Let the writer drain the queue.
    drop(dispatcher);
    join(comm.writer).await
}

async fn publish(
    config: Config,
    mqtt: MqttArgs,
    channel: u8,
    state: DesiredState,
) -> anyhow::Result<()> {
    let layout = TopicLayout::new(&config.mqtt, &config.payload);
    let (topic, payload) = layout.command_for(Channel::new(channel)?, state);

    let initiator = Initiator::new(
        &config.mqtt,
        &mqtt.mqtt_host,
        mqtt.mqtt_port,
        &mqtt.mqtt_username,
        &mqtt.mqtt_password,
    )
    .await?;
    initiator.publish_once(&topic, &payload).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_log();
    let args = Args::parse();

    let config = Config::from_file(&args.config_path)?;
    info!(
        "Starting {} {}. Config: {:?}",
        consts::GATE_NAME,
        consts::GATE_VERSION,
        config
    );

    match args.command {
        Command::Run { serial, mqtt } => run(config, serial, mqtt).await,
        Command::Pins { serial } => run_pins(config, serial).await,
        Command::Publish {
            mqtt,
            channel,
            state,
        } => publish(config, mqtt, channel, state.into()).await,
    }
}
