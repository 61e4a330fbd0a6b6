use crate::frame::CommandFrame;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_serial::{DataBits, Parity, StopBits};
use tracing::debug;

/// Frames waiting for the UART. Writes are fast, keep it short.
const QUEUE_DEPTH: usize = 15;

pub struct Comm {
    pub tx: mpsc::Sender<CommandFrame>,
    pub reader: JoinHandle<anyhow::Result<()>>,
    pub writer: JoinHandle<anyhow::Result<()>>,
}

/// The board never answers; anything it sends is logged and dropped.
async fn reader<R: AsyncRead + Unpin>(mut port: R) -> anyhow::Result<()> {
    let mut buf = [0u8; 64];
    loop {
        match port.read(&mut buf).await {
            Ok(count) if count > 0 => {
                debug!("UART->RX: ignoring {} bytes: {:02x?}", count, &buf[0..count]);
            }
            Ok(_) => {
                anyhow::bail!("Reader disconnected");
            }
            Err(e) => {
                anyhow::bail!("Error while reading from port {:?}", e);
            }
        }
    }
}

async fn writer<W: AsyncWrite + Unpin>(
    mut port: W,
    mut channel: mpsc::Receiver<CommandFrame>,
) -> anyhow::Result<()> {
    while let Some(frame) = channel.recv().await {
        let bytes = frame.as_bytes();
        if let Err(err) = port.write_all(bytes).await {
            anyhow::bail!("Error while sending to port {:?}", err);
        }
        port.flush().await?;
        debug!(
            "TX->UART: channel {}, {} bytes: {:02x?}",
            frame.channel(),
            bytes.len(),
            bytes
        );
    }
    Ok(())
}

/// Spawn reader and writer tasks over any duplex byte stream.
pub fn spawn<T>(stream: T) -> Comm
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    let (port_read, port_write) = tokio::io::split(stream);

    let (out_tx, out_rx) = mpsc::channel(QUEUE_DEPTH);
    let reader_handle = tokio::spawn(reader(port_read));
    let writer_handle = tokio::spawn(writer(port_write, out_rx));

    Comm {
        tx: out_tx,
        writer: writer_handle,
        reader: reader_handle,
    }
}

/// Open the UART (8N1) and start the link.
#[tracing::instrument]
pub fn run(port_name: String, baud_rate: u32) -> anyhow::Result<Comm> {
    let builder = tokio_serial::new(port_name, baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One);
    let stream = tokio_serial::SerialStream::open(&builder)?;
    Ok(spawn(stream))
}
