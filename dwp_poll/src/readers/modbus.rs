//! Modbus TCP register reader.
//!
//! Every `read` opens one connection, fetches all requested registers and
//! drops the connection. Registers are fetched as few contiguous blocks as
//! possible: one block when the addresses span at most
//! [`MAX_REGISTERS_PER_READ`] registers, otherwise greedy contiguous blocks
//! over the same connection.

use dwp_common::config::{ModbusSection, RegisterKind};
use dwp_common::consts::MAX_REGISTERS_PER_READ;
use dwp_common::device::RegisterField;
use dwp_common::reader::{Endpoint, RegisterReader, RegisterValues, TransportError};
use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;
use tokio_modbus::client::sync::{self, Client};
use tokio_modbus::slave::Slave;
use tokio_modbus::{Request, Response};
use tracing::trace;

/// Registry name of this reader.
pub const READER_NAME: &str = "modbus-tcp";

/// Factory for the reader registry.
pub fn create_reader(section: &ModbusSection) -> Box<dyn RegisterReader> {
    Box::new(ModbusTcpReader::new(section.timeout(), section.register_kind))
}

/// One contiguous register request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadBlock {
    /// First register address.
    pub start: u16,
    /// Number of registers.
    pub count: u16,
}

/// Group register addresses into contiguous read blocks.
///
/// Addresses are deduplicated and sorted; no block exceeds
/// [`MAX_REGISTERS_PER_READ`] registers.
pub fn plan_reads(registers: &[(RegisterField, u16)]) -> Vec<ReadBlock> {
    let mut addresses: Vec<u16> = registers.iter().map(|&(_, address)| address).collect();
    addresses.sort_unstable();
    addresses.dedup();

    let mut blocks: Vec<ReadBlock> = Vec::new();
    for address in addresses {
        match blocks.last_mut() {
            Some(block) if address - block.start < MAX_REGISTERS_PER_READ => {
                block.count = address - block.start + 1;
            }
            _ => blocks.push(ReadBlock {
                start: address,
                count: 1,
            }),
        }
    }
    blocks
}

/// Synchronous Modbus TCP reader with a bounded connect/read timeout.
#[derive(Debug, Clone)]
pub struct ModbusTcpReader {
    timeout: Duration,
    kind: RegisterKind,
}

impl ModbusTcpReader {
    /// Reader with the given timeout and register table.
    pub fn new(timeout: Duration, kind: RegisterKind) -> Self {
        Self { timeout, kind }
    }

    fn resolve(endpoint: &Endpoint) -> Result<SocketAddr, TransportError> {
        (endpoint.host.as_str(), endpoint.port)
            .to_socket_addrs()
            .map_err(|e| TransportError::Resolve(format!("{}: {}", endpoint.host, e)))?
            .next()
            .ok_or_else(|| TransportError::Resolve(endpoint.host.clone()))
    }
}

fn connect_error(endpoint: &Endpoint, e: io::Error) -> TransportError {
    match e.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
            TransportError::Timeout(endpoint.to_string())
        }
        _ => TransportError::Connect {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        },
    }
}

fn request_error(endpoint: &Endpoint, e: tokio_modbus::Error) -> TransportError {
    match e {
        tokio_modbus::Error::Transport(e)
            if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) =>
        {
            TransportError::Timeout(endpoint.to_string())
        }
        tokio_modbus::Error::Transport(e) if e.kind() == io::ErrorKind::InvalidData => {
            TransportError::Malformed {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            }
        }
        tokio_modbus::Error::Transport(e) => TransportError::Io {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        },
        other => TransportError::Malformed {
            endpoint: endpoint.to_string(),
            reason: other.to_string(),
        },
    }
}

impl RegisterReader for ModbusTcpReader {
    fn name(&self) -> &'static str {
        READER_NAME
    }

    fn read(
        &mut self,
        endpoint: &Endpoint,
        registers: &[(RegisterField, u16)],
    ) -> Result<RegisterValues, TransportError> {
        let socket_addr = Self::resolve(endpoint)?;
        let mut ctx = sync::tcp::connect_slave_with_timeout(
            socket_addr,
            Slave(endpoint.unit_id),
            Some(self.timeout),
        )
        .map_err(|e| connect_error(endpoint, e))?;

        let mut words: HashMap<u16, u16> = HashMap::with_capacity(registers.len());
        for block in plan_reads(registers) {
            trace!(
                "{}: reading {} register(s) at {} ({:?})",
                endpoint, block.count, block.start, self.kind
            );
            let request = match self.kind {
                RegisterKind::Input => Request::ReadInputRegisters(block.start, block.count),
                RegisterKind::Holding => Request::ReadHoldingRegisters(block.start, block.count),
            };
            let response = ctx
                .call(request)
                .map_err(|e| request_error(endpoint, e))?
                .map_err(|code| TransportError::Exception {
                    endpoint: endpoint.to_string(),
                    code: format!("{code:?}"),
                })?;
            let data = match response {
                Response::ReadInputRegisters(words) | Response::ReadHoldingRegisters(words) => words,
                other => {
                    return Err(TransportError::Malformed {
                        endpoint: endpoint.to_string(),
                        reason: format!("unexpected response {other:?}"),
                    });
                }
            };

            if data.len() != usize::from(block.count) {
                return Err(TransportError::Malformed {
                    endpoint: endpoint.to_string(),
                    reason: format!(
                        "expected {} register(s) at {}, got {}",
                        block.count,
                        block.start,
                        data.len()
                    ),
                });
            }
            for (offset, word) in (0..block.count).zip(data) {
                words.insert(block.start + offset, word);
            }
        }

        registers
            .iter()
            .map(|&(field, address)| {
                words
                    .get(&address)
                    .map(|&word| (field, word as i16))
                    .ok_or_else(|| TransportError::Malformed {
                        endpoint: endpoint.to_string(),
                        reason: format!("register {address} missing from response"),
                    })
            })
            .collect()
    }
}
