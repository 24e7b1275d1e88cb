use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor, Read, Write};

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }

    /// Minimum "version needed to extract" for entries using this method.
    pub fn version_needed(&self) -> u16 {
        match self {
            CompressionMethod::Stored => VERSION_STORED,
            _ => VERSION_DEFLATE,
        }
    }
}

/// Version 1.0: stored entries only
pub const VERSION_STORED: u16 = 10;
/// Version 2.0: DEFLATE, directories
pub const VERSION_DEFLATE: u16 = 20;
/// "Version made by": MS-DOS host, APPNOTE version 2.0
pub const VERSION_MADE_BY: u16 = 20;

/// General purpose flag: entry is encrypted
pub const FLAG_ENCRYPTED: u16 = 1 << 0;
/// General purpose flag: crc and sizes follow the payload in a data descriptor
pub const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;
/// General purpose flag: file name is UTF-8
pub const FLAG_UTF8: u16 = 1 << 11;

/// MS-DOS directory attribute, stored in the low byte of the external attributes
pub const DOS_DIRECTORY_ATTR: u32 = 0x10;

/// DOS date for 1980-01-01, the earliest date a ZIP timestamp can hold.
pub const DOS_EPOCH_DATE: u16 = (1 << 5) | 1;
pub const DOS_EPOCH_TIME: u16 = 0;

/// 32-bit field value that signals a ZIP64 extra field holds the real value
pub const ZIP64_SENTINEL: u32 = 0xFFFF_FFFF;

/// End of Central Directory (EOCD) - 22 bytes minimum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    /// Single-disk record without a comment.
    pub fn new(total_entries: u16, cd_size: u32, cd_offset: u32) -> Self {
        Self {
            disk_number: 0,
            disk_with_cd: 0,
            disk_entries: total_entries,
            total_entries,
            cd_size,
            cd_offset,
            comment_len: 0,
        }
    }

    pub fn from_bytes(data: &[u8]) -> io::Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Invalid End of Central Directory",
            ));
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_number: cursor.read_u16::<LittleEndian>()?,
            disk_with_cd: cursor.read_u16::<LittleEndian>()?,
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(Self::SIGNATURE)?;
        writer.write_u16::<LittleEndian>(self.disk_number)?;
        writer.write_u16::<LittleEndian>(self.disk_with_cd)?;
        writer.write_u16::<LittleEndian>(self.disk_entries)?;
        writer.write_u16::<LittleEndian>(self.total_entries)?;
        writer.write_u32::<LittleEndian>(self.cd_size)?;
        writer.write_u32::<LittleEndian>(self.cd_offset)?;
        writer.write_u16::<LittleEndian>(self.comment_len)?;
        Ok(())
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// Data descriptor, optionally preceded by this signature
pub const DATA_DESCRIPTOR_SIGNATURE: &[u8] = b"PK\x07\x08";

/// Records that may legitimately follow the last local entry.
pub const TRAILING_SIGNATURES: [&[u8]; 5] = [
    CDFH_SIGNATURE,
    EndOfCentralDirectory::SIGNATURE,
    b"PK\x06\x06", // ZIP64 end of central directory
    b"PK\x06\x07", // ZIP64 end of central directory locator
    b"PK\x05\x05", // digital signature
];

fn u16_len(len: usize, what: &str) -> io::Result<u16> {
    u16::try_from(len).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{what} is {len} bytes, longer than a ZIP header can record"),
        )
    })
}

/// Local File Header: the fixed 30-byte record plus its name and extra field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileHeader {
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name: Vec<u8>,
    pub extra_field: Vec<u8>,
}

impl LocalFileHeader {
    /// Parse a header whose 4-byte signature has already been consumed.
    pub fn read_after_signature<R: Read>(reader: &mut R) -> io::Result<Self> {
        let version_needed = reader.read_u16::<LittleEndian>()?;
        let flags = reader.read_u16::<LittleEndian>()?;
        let compression_method = CompressionMethod::from_u16(reader.read_u16::<LittleEndian>()?);
        let last_mod_time = reader.read_u16::<LittleEndian>()?;
        let last_mod_date = reader.read_u16::<LittleEndian>()?;
        let crc32 = reader.read_u32::<LittleEndian>()?;
        let compressed_size = reader.read_u32::<LittleEndian>()?;
        let uncompressed_size = reader.read_u32::<LittleEndian>()?;
        let file_name_length = reader.read_u16::<LittleEndian>()?;
        let extra_field_length = reader.read_u16::<LittleEndian>()?;

        let mut file_name = vec![0u8; file_name_length as usize];
        reader.read_exact(&mut file_name)?;
        let mut extra_field = vec![0u8; extra_field_length as usize];
        reader.read_exact(&mut extra_field)?;

        Ok(Self {
            version_needed,
            flags,
            compression_method,
            last_mod_time,
            last_mod_date,
            crc32,
            compressed_size,
            uncompressed_size,
            file_name,
            extra_field,
        })
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let name_len = u16_len(self.file_name.len(), "file name")?;
        let extra_len = u16_len(self.extra_field.len(), "extra field")?;

        writer.write_all(LFH_SIGNATURE)?;
        writer.write_u16::<LittleEndian>(self.version_needed)?;
        writer.write_u16::<LittleEndian>(self.flags)?;
        writer.write_u16::<LittleEndian>(self.compression_method.as_u16())?;
        writer.write_u16::<LittleEndian>(self.last_mod_time)?;
        writer.write_u16::<LittleEndian>(self.last_mod_date)?;
        writer.write_u32::<LittleEndian>(self.crc32)?;
        writer.write_u32::<LittleEndian>(self.compressed_size)?;
        writer.write_u32::<LittleEndian>(self.uncompressed_size)?;
        writer.write_u16::<LittleEndian>(name_len)?;
        writer.write_u16::<LittleEndian>(extra_len)?;
        writer.write_all(&self.file_name)?;
        writer.write_all(&self.extra_field)?;
        Ok(())
    }

    /// Bytes occupied by the header on disk, name and extra field included.
    pub fn encoded_len(&self) -> u64 {
        (LFH_SIZE + self.file_name.len() + self.extra_field.len()) as u64
    }

    pub fn has_data_descriptor(&self) -> bool {
        self.flags & FLAG_DATA_DESCRIPTOR != 0
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }
}

/// Central Directory File Header, as written by this crate (no extra field, no comment).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralDirectoryHeader {
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub external_attrs: u32,
    pub lfh_offset: u32,
    pub file_name: Vec<u8>,
}

impl CentralDirectoryHeader {
    /// Read one record including its signature. Extra field and comment are skipped.
    pub fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut sig = [0u8; 4];
        reader.read_exact(&mut sig)?;
        if sig != CDFH_SIGNATURE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Invalid Central Directory File Header",
            ));
        }

        let version_made_by = reader.read_u16::<LittleEndian>()?;
        let version_needed = reader.read_u16::<LittleEndian>()?;
        let flags = reader.read_u16::<LittleEndian>()?;
        let compression_method = CompressionMethod::from_u16(reader.read_u16::<LittleEndian>()?);
        let last_mod_time = reader.read_u16::<LittleEndian>()?;
        let last_mod_date = reader.read_u16::<LittleEndian>()?;
        let crc32 = reader.read_u32::<LittleEndian>()?;
        let compressed_size = reader.read_u32::<LittleEndian>()?;
        let uncompressed_size = reader.read_u32::<LittleEndian>()?;
        let file_name_length = reader.read_u16::<LittleEndian>()?;
        let extra_field_length = reader.read_u16::<LittleEndian>()?;
        let file_comment_length = reader.read_u16::<LittleEndian>()?;
        let _disk_number_start = reader.read_u16::<LittleEndian>()?;
        let _internal_attrs = reader.read_u16::<LittleEndian>()?;
        let external_attrs = reader.read_u32::<LittleEndian>()?;
        let lfh_offset = reader.read_u32::<LittleEndian>()?;

        let mut file_name = vec![0u8; file_name_length as usize];
        reader.read_exact(&mut file_name)?;
        let skip = extra_field_length as u64 + file_comment_length as u64;
        io::copy(&mut reader.take(skip), &mut io::sink())?;

        Ok(Self {
            version_made_by,
            version_needed,
            flags,
            compression_method,
            last_mod_time,
            last_mod_date,
            crc32,
            compressed_size,
            uncompressed_size,
            external_attrs,
            lfh_offset,
            file_name,
        })
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let name_len = u16_len(self.file_name.len(), "file name")?;

        writer.write_all(CDFH_SIGNATURE)?;
        writer.write_u16::<LittleEndian>(self.version_made_by)?;
        writer.write_u16::<LittleEndian>(self.version_needed)?;
        writer.write_u16::<LittleEndian>(self.flags)?;
        writer.write_u16::<LittleEndian>(self.compression_method.as_u16())?;
        writer.write_u16::<LittleEndian>(self.last_mod_time)?;
        writer.write_u16::<LittleEndian>(self.last_mod_date)?;
        writer.write_u32::<LittleEndian>(self.crc32)?;
        writer.write_u32::<LittleEndian>(self.compressed_size)?;
        writer.write_u32::<LittleEndian>(self.uncompressed_size)?;
        writer.write_u16::<LittleEndian>(name_len)?;
        writer.write_u16::<LittleEndian>(0)?; // extra field length
        writer.write_u16::<LittleEndian>(0)?; // file comment length
        writer.write_u16::<LittleEndian>(0)?; // disk number start
        writer.write_u16::<LittleEndian>(0)?; // internal attributes
        writer.write_u32::<LittleEndian>(self.external_attrs)?;
        writer.write_u32::<LittleEndian>(self.lfh_offset)?;
        writer.write_all(&self.file_name)?;
        Ok(())
    }

    pub fn encoded_len(&self) -> u64 {
        (CDFH_MIN_SIZE + self.file_name.len()) as u64
    }
}
