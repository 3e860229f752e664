//! Serial-port transport for a NeoDK box.

use crate::error::Error;
use bytes::Bytes;
use neodk_lib::constants::BAUD_RATE;
use neodk_lib::error::NeoError;
use neodk_lib::transport::{TransportReader, TransportWriter};
use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use std::io::{self, Read, Write};
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Poll interval of the blocking reader thread
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Chunks the reader thread may hold before it waits for the session.
const READ_QUEUE_CAPACITY: usize = 32;

/// USB-serial bridges a box may sit behind: (vendor id, product id or any).
const KNOWN_ADAPTERS: &[(u16, Option<u16>)] = &[
    (0x0403, None), // FTDI
    (0x067b, None), // Prolific
    (0x10c4, None), // Silicon Labs
    (0x1a86, None), // WCH
    (0x16d0, Some(0x12ef)),
];

fn is_known_adapter(info: &SerialPortInfo) -> bool {
    match &info.port_type {
        SerialPortType::UsbPort(usb) => KNOWN_ADAPTERS
            .iter()
            .any(|&(vid, pid)| usb.vid == vid && pid.is_none_or(|pid| usb.pid == pid)),
        _ => false,
    }
}

/// Serial ports that look like a NeoDK box.
pub fn list_ports() -> Result<Vec<SerialPortInfo>, Error> {
    let ports = serialport::available_ports()?;
    Ok(ports.into_iter().filter(is_known_adapter).collect())
}

/// Open `path`, or the first known adapter when no path is given.
pub fn open(path: Option<&str>) -> Result<(SerialReader, SerialWriter), Error> {
    let path = match path {
        Some(path) => path.to_string(),
        None => list_ports()?.into_iter().next().ok_or(Error::PortNotFound)?.port_name,
    };
    let port = serialport::new(&path, BAUD_RATE).timeout(READ_TIMEOUT).open()?;
    let reader = port.try_clone()?;
    info!(%path, baud = BAUD_RATE, "Opened serial port");
    Ok((SerialReader::spawn(reader), SerialWriter { port: Some(port) }))
}

/// Bridges a blocking port into tokio through a reader thread.
pub struct SerialReader {
    chunks: mpsc::Receiver<io::Result<Bytes>>,
}

impl SerialReader {
    fn spawn(port: Box<dyn SerialPort>) -> Self {
        let (tx, chunks) = mpsc::channel(READ_QUEUE_CAPACITY);
        thread::spawn(move || {
            pump(port, tx);
            debug!("Serial reader thread finished");
        });
        Self { chunks }
    }
}

/// Blocking read loop of the reader thread. Returns once the port ends or
/// fails, or once the receiving side is gone.
fn pump<R: Read>(mut port: R, tx: mpsc::Sender<io::Result<Bytes>>) {
    let mut buf = [0u8; 256];
    loop {
        let chunk = match port.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => Ok(Bytes::copy_from_slice(&buf[..n])),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                if tx.is_closed() {
                    break;
                }
                continue;
            }
            Err(e) if is_disconnect(&e) => break,
            Err(e) => Err(e),
        };
        let failed = chunk.is_err();
        if tx.blocking_send(chunk).is_err() || failed {
            break;
        }
    }
}

fn is_disconnect(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::BrokenPipe | io::ErrorKind::UnexpectedEof)
}

impl TransportReader for SerialReader {
    async fn read(&mut self) -> Result<Option<Bytes>, NeoError> {
        match self.chunks.recv().await {
            Some(Ok(chunk)) => Ok(Some(chunk)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }
}

pub struct SerialWriter {
    // Lent to a blocking task for the duration of each write
    port: Option<Box<dyn SerialPort>>,
}

impl TransportWriter for SerialWriter {
    async fn write(&mut self, frame: Bytes) -> Result<(), NeoError> {
        let mut port = self.port.take().ok_or(NeoError::SessionClosed)?;
        let (port, result) = tokio::task::spawn_blocking(move || {
            let result = port.write_all(&frame).and_then(|()| port.flush());
            (port, result)
        })
        .await?;
        self.port = Some(port);
        if let Err(e) = &result {
            warn!("Serial write failed: {}", e);
        }
        Ok(result?)
    }
}
