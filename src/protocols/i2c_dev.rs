// SPDX-License-Identifier: GPL-3.0-only
//! Linux `/dev/i2c-N` access for the framed transport

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use super::framed::I2cBus;

/// `ioctl` request selecting the slave address (linux/i2c-dev.h)
const I2C_SLAVE: u16 = 0x0703;

/// 7-bit slave address of the DDC/CI endpoint
pub const DDC_CI_ADDRESS: u16 = 0x37;

pub struct I2cDevBus {
    file: File,
    path: PathBuf,
}

impl I2cDevBus {
    /// Open an I2C character device and bind it to the DDC/CI slave
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        let rc = unsafe {
            libc::ioctl(
                file.as_raw_fd(),
                I2C_SLAVE as _,
                libc::c_ulong::from(DDC_CI_ADDRESS),
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }

        debug!("opened {} for DDC/CI", path.display());
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl I2cBus for I2cDevBus {
    fn write(&mut self, data_address: u8, bytes: &[u8]) -> io::Result<()> {
        let mut message = Vec::with_capacity(bytes.len() + 1);
        message.push(data_address);
        message.extend_from_slice(bytes);

        // i2c-dev turns each write() into one bus transaction
        let written = self.file.write(&message)?;
        if written != message.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short I2C write: {written}/{}", message.len()),
            ));
        }
        Ok(())
    }

    fn read(&mut self, _data_address: u8, buf: &mut [u8]) -> io::Result<()> {
        let read = self.file.read(buf)?;
        if read != buf.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("short I2C read: {read}/{}", buf.len()),
            ));
        }
        Ok(())
    }
}
