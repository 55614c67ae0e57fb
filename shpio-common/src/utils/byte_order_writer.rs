/*
This code is part of the shpio shapefile library.
Authors: Dr. John Lindsay
Created: 02/09/2026
Last Modified: 14/10/2026
License: MIT
*/
use super::byte_order_reader::Endianness;
use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use std::io::prelude::*;
use std::io::Error;

pub struct ByteOrderWriter<W: Write> {
    is_le: bool,
    writer: W,
    num_bytes_written: usize,
}

impl<W: Write> ByteOrderWriter<W> {
    pub fn new(writer: W, byte_order: Endianness) -> ByteOrderWriter<W> {
        let is_le = byte_order == Endianness::LittleEndian;
        ByteOrderWriter::<W> {
            writer: writer,
            is_le: is_le,
            num_bytes_written: 0,
        }
    }

    pub fn get_num_bytes_written(&self) -> usize {
        self.num_bytes_written
    }

    pub fn set_byte_order(&mut self, byte_order: Endianness) {
        self.is_le = byte_order == Endianness::LittleEndian;
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.num_bytes_written += bytes.len();
        self.writer.write_all(bytes)
    }

    pub fn write_u32(&mut self, value: u32) -> Result<(), Error> {
        self.num_bytes_written += 4;
        if self.is_le {
            self.writer.write_u32::<LittleEndian>(value)
        } else {
            self.writer.write_u32::<BigEndian>(value)
        }
    }

    pub fn write_i32(&mut self, value: i32) -> Result<(), Error> {
        self.num_bytes_written += 4;
        if self.is_le {
            self.writer.write_i32::<LittleEndian>(value)
        } else {
            self.writer.write_i32::<BigEndian>(value)
        }
    }

    pub fn write_f64(&mut self, value: f64) -> Result<(), Error> {
        self.num_bytes_written += 8;
        if self.is_le {
            self.writer.write_f64::<LittleEndian>(value)
        } else {
            self.writer.write_f64::<BigEndian>(value)
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_byte_order_switching() {
        let mut bow = ByteOrderWriter::new(Vec::new(), Endianness::BigEndian);
        bow.write_i32(9994).unwrap();
        bow.set_byte_order(Endianness::LittleEndian);
        bow.write_i32(1000).unwrap();
        bow.write_f64(1.0).unwrap();
        assert_eq!(bow.get_num_bytes_written(), 16);
        let bytes = bow.into_inner();
        assert_eq!(&bytes[0..4], &[0x00, 0x00, 0x27, 0x0a]);
        assert_eq!(&bytes[4..8], &[0xe8, 0x03, 0x00, 0x00]);
        assert_eq!(&bytes[8..16], &1.0f64.to_le_bytes());
    }
}
