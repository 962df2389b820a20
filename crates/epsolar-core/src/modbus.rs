//! Minimal Modbus RTU master: framing, CRC, and register/coil reads.
//!
//! Only the two function codes the charge controller needs are supported:
//! read coils (0x01) and read input registers (0x04). The client is generic
//! over any `Read + Write` byte stream so it runs against a real serial port
//! or an in-memory script.

use std::io::{Read, Write};

use thiserror::Error;

/// Read coils.
pub const READ_COILS: u8 = 0x01;
/// Read input registers.
pub const READ_INPUT_REGISTERS: u8 = 0x04;

const EXCEPTION_FLAG: u8 = 0x80;
/// Largest register count a single RTU reply can carry.
const MAX_REGISTERS: u16 = 125;
/// Largest coil count a single RTU reply can carry.
const MAX_COILS: u16 = 2000;

/// Malformed or unexpected reply.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("CRC mismatch: expected {expected:#06x}, got {actual:#06x}")]
    Crc { expected: u16, actual: u16 },
    #[error("reply from slave {actual}, expected {expected}")]
    Slave { expected: u8, actual: u8 },
    #[error("reply for function {actual:#04x}, expected {expected:#04x}")]
    Function { expected: u8, actual: u8 },
    #[error("reply carries {actual} data bytes, expected {expected}")]
    ByteCount { expected: usize, actual: usize },
    #[error("cannot request {0} registers in one frame")]
    Quantity(u16),
}

/// Failure of a single Modbus transaction.
#[derive(Debug, Error)]
pub enum ModbusError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("device exception {code:#04x} for function {function:#04x}")]
    Exception { function: u8, code: u8 },
}

/// CRC-16/MODBUS (reflected polynomial 0xA001, initial value 0xFFFF).
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= byte as u16;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Append the CRC to a frame body, low byte first.
fn seal(mut frame: Vec<u8>) -> Vec<u8> {
    let crc = crc16(&frame);
    frame.extend_from_slice(&crc.to_le_bytes());
    frame
}

/// Build a read request frame for `function` starting at `address`.
pub fn encode_read_request(slave: u8, function: u8, address: u16, quantity: u16) -> Vec<u8> {
    let mut frame = Vec::with_capacity(8);
    frame.push(slave);
    frame.push(function);
    frame.extend_from_slice(&address.to_be_bytes());
    frame.extend_from_slice(&quantity.to_be_bytes());
    seal(frame)
}

/// Modbus RTU master bound to one slave on a byte stream.
pub struct RtuClient<T> {
    io: T,
    slave: u8,
}

impl<T: Read + Write> RtuClient<T> {
    pub fn new(io: T, slave: u8) -> Self {
        Self { io, slave }
    }

    /// Read `quantity` consecutive input registers starting at `address`.
    pub fn read_input_registers(
        &mut self,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<u16>, ModbusError> {
        if quantity == 0 || quantity > MAX_REGISTERS {
            return Err(FrameError::Quantity(quantity).into());
        }
        let data = self.transact(READ_INPUT_REGISTERS, address, quantity, quantity as usize * 2)?;
        Ok(data
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect())
    }

    /// Read `quantity` coils starting at `address`.
    pub fn read_coils(&mut self, address: u16, quantity: u16) -> Result<Vec<bool>, ModbusError> {
        if quantity == 0 || quantity > MAX_COILS {
            return Err(FrameError::Quantity(quantity).into());
        }
        let expected = (quantity as usize).div_ceil(8);
        let data = self.transact(READ_COILS, address, quantity, expected)?;
        Ok((0..quantity as usize)
            .map(|i| data[i / 8] & (1 << (i % 8)) != 0)
            .collect())
    }

    /// Send one request and return the validated data section of the reply.
    fn transact(
        &mut self,
        function: u8,
        address: u16,
        quantity: u16,
        expected_len: usize,
    ) -> Result<Vec<u8>, ModbusError> {
        let request = encode_read_request(self.slave, function, address, quantity);
        self.io.write_all(&request)?;
        self.io.flush()?;

        // slave, function, then byte count or exception code
        let mut header = [0u8; 3];
        self.io.read_exact(&mut header)?;

        if header[1] == function | EXCEPTION_FLAG {
            let mut crc = [0u8; 2];
            self.io.read_exact(&mut crc)?;
            check_crc(&header, crc)?;
            check_slave(self.slave, header[0])?;
            return Err(ModbusError::Exception {
                function,
                code: header[2],
            });
        }

        let byte_count = header[2] as usize;
        if byte_count != expected_len {
            return Err(FrameError::ByteCount {
                expected: expected_len,
                actual: byte_count,
            }
            .into());
        }

        let mut rest = vec![0u8; byte_count + 2];
        self.io.read_exact(&mut rest)?;
        let (data, crc) = rest.split_at(byte_count);

        let mut frame = Vec::with_capacity(3 + byte_count);
        frame.extend_from_slice(&header);
        frame.extend_from_slice(data);
        check_crc(&frame, [crc[0], crc[1]])?;
        check_slave(self.slave, header[0])?;
        if header[1] != function {
            return Err(FrameError::Function {
                expected: function,
                actual: header[1],
            }
            .into());
        }

        Ok(data.to_vec())
    }
}

fn check_crc(frame: &[u8], received: [u8; 2]) -> Result<(), FrameError> {
    let expected = crc16(frame);
    let actual = u16::from_le_bytes(received);
    if expected != actual {
        return Err(FrameError::Crc { expected, actual });
    }
    Ok(())
}

fn check_slave(expected: u8, actual: u8) -> Result<(), FrameError> {
    if expected != actual {
        return Err(FrameError::Slave { expected, actual });
    }
    Ok(())
}
