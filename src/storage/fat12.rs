use chrono::prelude::*;
use log::debug;
use thiserror::Error;

use crate::storage::{KvStore, SectorCache, SECTOR_SIZE};

#[cfg(test)]
#[path = "./fat12_test.rs"]
mod fat12_test;

// 1.44 MB floppy geometry
pub const TOTAL_SECTORS: u16 = 2880;
pub const SECTORS_PER_TRACK: u16 = 18;
pub const HEADS: u16 = 2;
pub const SECTORS_PER_FAT: u16 = 9;
pub const FAT1_SECTOR: u16 = 1;
pub const FAT2_SECTOR: u16 = FAT1_SECTOR + SECTORS_PER_FAT;
pub const ROOT_DIR_SECTOR: u16 = FAT2_SECTOR + SECTORS_PER_FAT;
pub const ROOT_DIR_ENTRIES: usize = 224;
pub const ROOT_DIR_SECTORS: u16 = (ROOT_DIR_ENTRIES * DIR_ENTRY_SIZE / SECTOR_SIZE) as u16;
pub const DATA_START_SECTOR: u16 = ROOT_DIR_SECTOR + ROOT_DIR_SECTORS;
pub const MEDIA_DESCRIPTOR: u8 = 0xF0;
pub const DIR_ENTRY_SIZE: usize = 32;

/// first cluster index past the last valid data cluster
pub const MAX_CLUSTER: u16 = (TOTAL_SECTORS - DATA_START_SECTOR) + 2;

/// any FAT entry at or above this terminates a chain
pub const CHAIN_END: u16 = 0xFF8;

pub const ATTR_READ_ONLY: u8 = 0x01;
pub const ATTR_HIDDEN: u8 = 0x02;
pub const ATTR_SYSTEM: u8 = 0x04;
pub const ATTR_VOLUME: u8 = 0x08;
pub const ATTR_DIRECTORY: u8 = 0x10;
pub const ATTR_ARCHIVE: u8 = 0x20;
pub const ATTR_LONG_NAME: u8 = 0x0F;

#[derive(Debug, Error, PartialEq)]
pub enum FsError {
    #[error("disk full")]
    DiskFull,
    #[error("directory full")]
    DirectoryFull,
    #[error("already exists")]
    AlreadyExists,
    #[error("not found")]
    NotFound,
    #[error("path not found")]
    PathNotFound,
}

/// a decoded 32-byte directory entry
#[derive(Clone, Debug, PartialEq)]
pub struct DirEntry {
    pub name: String,
    pub attr: u8,
    pub time: u16,
    pub date: u16,
    pub first_cluster: u16,
    pub size: u32,
}

impl DirEntry {
    pub fn is_directory(&self) -> bool {
        self.attr & ATTR_DIRECTORY != 0
    }

    pub fn is_volume_label(&self) -> bool {
        self.attr & ATTR_VOLUME != 0 && self.attr != ATTR_LONG_NAME
    }
}

/// where a directory's 32-byte slots live
#[derive(Copy, Clone, Debug, PartialEq)]
enum DirLoc {
    Root,
    Cluster(u16),
}

/// the FAT12 storage engine: translates directory paths and 8.3 names into
/// linear byte content and back, persisted one sector at a time
pub struct Fat12 {
    cache: SectorCache,

    /// pins directory timestamps to the DOS epoch (used by tests)
    pub deterministic: bool,
}

impl Fat12 {
    pub fn new(store: Box<dyn KvStore>) -> Self {
        Fat12 {
            cache: SectorCache::new(store),
            deterministic: false,
        }
    }

    /// true when sector 0 starts with the boot-jump opcode
    pub fn is_formatted(&mut self) -> bool {
        self.cache.read_u8(0, 0) == 0xEB
    }

    /// wipes the disk and writes a fresh boot sector, FATs and root label
    pub fn format(&mut self, label: &str) {
        self.cache.wipe();
        self.write_boot_sector(label);

        // both FATs: media descriptor in entry 0, fff in entry 1
        for fat in &[FAT1_SECTOR, FAT2_SECTOR] {
            let sector = self.cache.sector_mut(*fat);
            sector[0] = MEDIA_DESCRIPTOR;
            sector[1] = 0xFF;
            sector[2] = 0xFF;
        }

        // volume label entry in the first root slot
        let (time, date) = self.timestamp();
        let raw = encode_entry(&pad_label(label), ATTR_VOLUME, time, date, 0, 0);
        self.cache.sector_mut(ROOT_DIR_SECTOR)[0..DIR_ENTRY_SIZE].copy_from_slice(&raw);

        self.cache.flush();
    }

    fn write_boot_sector(&mut self, label: &str) {
        let serial: u32 = if self.deterministic {
            0x1234_5678
        } else {
            Local::now().timestamp() as u32
        };
        let sector = self.cache.sector_mut(0);
        sector[0] = 0xEB; // jmp short
        sector[1] = 0x3C;
        sector[2] = 0x90; // nop
        sector[3..11].copy_from_slice(b"RETROBOX");
        sector[11..13].copy_from_slice(&(SECTOR_SIZE as u16).to_le_bytes());
        sector[13] = 1; // sectors per cluster
        sector[14..16].copy_from_slice(&1u16.to_le_bytes()); // reserved sectors
        sector[16] = 2; // number of FATs
        sector[17..19].copy_from_slice(&(ROOT_DIR_ENTRIES as u16).to_le_bytes());
        sector[19..21].copy_from_slice(&TOTAL_SECTORS.to_le_bytes());
        sector[21] = MEDIA_DESCRIPTOR;
        sector[22..24].copy_from_slice(&SECTORS_PER_FAT.to_le_bytes());
        sector[24..26].copy_from_slice(&SECTORS_PER_TRACK.to_le_bytes());
        sector[26..28].copy_from_slice(&HEADS.to_le_bytes());
        sector[28..32].copy_from_slice(&0u32.to_le_bytes()); // hidden sectors
        sector[32..36].copy_from_slice(&0u32.to_le_bytes()); // total sectors 32
        sector[36] = 0; // drive number
        sector[38] = 0x29; // extended boot signature
        sector[39..43].copy_from_slice(&serial.to_le_bytes());
        sector[43..54].copy_from_slice(&pad_label(label));
        sector[54..62].copy_from_slice(b"FAT12   ");
        sector[510] = 0x55;
        sector[511] = 0xAA;
    }

    /// visible entries of the named directory, volume labels filtered out
    pub fn list_dir(&mut self, path: &[String]) -> Result<Vec<DirEntry>, FsError> {
        let loc = self.resolve_dir(path)?;
        let entries = self
            .entries(loc)
            .into_iter()
            .map(|(_, _, e)| e)
            .filter(|e| !e.is_volume_label())
            .collect();
        Ok(entries)
    }

    /// returns exactly `size` bytes of the named file
    pub fn read_file(&mut self, path: &[String], name: &str) -> Result<Vec<u8>, FsError> {
        let loc = self.resolve_dir(path)?;
        let entry = self.find_entry(loc, name).ok_or(FsError::NotFound)?.2;
        if entry.is_directory() {
            return Err(FsError::NotFound);
        }
        let mut data = Vec::new();
        if entry.first_cluster >= 2 {
            for cluster in self.chain(entry.first_cluster) {
                let lba = cluster_to_lba(cluster);
                data.extend_from_slice(self.cache.sector(lba));
            }
        }
        // the size field wins over the chain length
        data.resize(entry.size as usize, 0);
        Ok(data)
    }

    /// replaces the named file with `data`, allocating a fresh cluster chain
    pub fn write_file(&mut self, path: &[String], name: &str, data: &[u8]) -> Result<(), FsError> {
        let loc = self.resolve_dir(path)?;
        self.remove_entry(loc, name);

        let slot = self.free_slot(loc).ok_or_else(|| {
            self.cache.flush();
            FsError::DirectoryFull
        })?;

        let first_cluster = match self.alloc_chain(data) {
            Ok(first) => first,
            Err(e) => {
                self.cache.flush();
                return Err(e);
            }
        };

        let (time, date) = self.timestamp();
        let raw = encode_entry(
            &encode_83(name),
            ATTR_ARCHIVE,
            time,
            date,
            first_cluster,
            data.len() as u32,
        );
        self.write_slot(slot, &raw);
        self.cache.flush();
        Ok(())
    }

    /// creates a subdirectory holding only `.` and `..`
    pub fn mkdir(&mut self, path: &[String], name: &str) -> Result<(), FsError> {
        let loc = self.resolve_dir(path)?;
        if self.find_entry(loc, name).is_some() {
            return Err(FsError::AlreadyExists);
        }
        let slot = self.free_slot(loc).ok_or(FsError::DirectoryFull)?;
        let cluster = self.alloc_cluster().ok_or(FsError::DiskFull)?;
        self.fat_set(cluster, 0xFFF);

        let lba = cluster_to_lba(cluster);
        let (time, date) = self.timestamp();
        {
            let sector = self.cache.sector_mut(lba);
            for b in sector.iter_mut() {
                *b = 0;
            }
        }
        let parent_cluster = match loc {
            DirLoc::Root => 0,
            DirLoc::Cluster(c) => c,
        };
        let dot = encode_entry(b".          ", ATTR_DIRECTORY, time, date, cluster, 0);
        let dotdot = encode_entry(b"..         ", ATTR_DIRECTORY, time, date, parent_cluster, 0);
        {
            let sector = self.cache.sector_mut(lba);
            sector[0..DIR_ENTRY_SIZE].copy_from_slice(&dot);
            sector[DIR_ENTRY_SIZE..2 * DIR_ENTRY_SIZE].copy_from_slice(&dotdot);
        }

        let raw = encode_entry(&encode_83(name), ATTR_DIRECTORY, time, date, cluster, 0);
        self.write_slot(slot, &raw);
        self.cache.flush();
        Ok(())
    }

    /// marks the entry deleted and frees its cluster chain.
    /// Ok(true) iff the entry was found.
    pub fn delete_entry(&mut self, path: &[String], name: &str) -> Result<bool, FsError> {
        let loc = self.resolve_dir(path)?;
        let found = self.remove_entry(loc, name);
        self.cache.flush();
        Ok(found)
    }

    /// rewrites the 8.3 name in place, the cluster chain is untouched
    pub fn rename_entry(&mut self, path: &[String], old: &str, new: &str) -> Result<(), FsError> {
        let loc = self.resolve_dir(path)?;
        if self.find_entry(loc, new).is_some() {
            return Err(FsError::AlreadyExists);
        }
        let (sector, offset, _) = self.find_entry(loc, old).ok_or(FsError::NotFound)?;
        let raw = encode_83(new);
        self.cache.sector_mut(sector)[offset..offset + 11].copy_from_slice(&raw);
        self.cache.flush();
        Ok(())
    }

    /// count of zero entries in the first FAT in [2, MAX_CLUSTER)
    pub fn free_clusters(&mut self) -> usize {
        (2..MAX_CLUSTER).filter(|c| self.fat_get(*c) == 0).count()
    }

    pub fn attributes(&mut self, path: &[String], name: &str) -> Result<u8, FsError> {
        let loc = self.resolve_dir(path)?;
        let entry = self.find_entry(loc, name).ok_or(FsError::NotFound)?.2;
        Ok(entry.attr)
    }

    pub fn set_attributes(&mut self, path: &[String], name: &str, attr: u8) -> Result<(), FsError> {
        let loc = self.resolve_dir(path)?;
        let (sector, offset, _) = self.find_entry(loc, name).ok_or(FsError::NotFound)?;
        self.cache.sector_mut(sector)[offset + 11] = attr;
        self.cache.flush();
        Ok(())
    }

    /// raw sector read for the BIOS disk service
    pub fn read_sector(&mut self, lba: u16) -> Vec<u8> {
        self.cache.sector(lba).to_vec()
    }

    pub fn flush(&mut self) {
        self.cache.flush();
    }

    /// read access to the backing store (diagnostics and tests)
    pub fn backing(&self) -> &dyn KvStore {
        self.cache.store()
    }

    // --- FAT access -------------------------------------------------------

    fn fat_byte(&mut self, offset: usize, fat_start: u16) -> u8 {
        let sector = fat_start + (offset / SECTOR_SIZE) as u16;
        self.cache.read_u8(sector, offset % SECTOR_SIZE)
    }

    fn set_fat_byte(&mut self, offset: usize, fat_start: u16, data: u8) {
        let sector = fat_start + (offset / SECTOR_SIZE) as u16;
        self.cache.write_u8(sector, offset % SECTOR_SIZE, data);
    }

    /// reads the 12-bit entry for `cluster` from the first FAT.
    /// byte offset is c + (c >> 1); even clusters sit in the low 12 bits of
    /// the word at that offset, odd clusters in the high 12 bits.
    pub fn fat_get(&mut self, cluster: u16) -> u16 {
        let offset = usize::from(cluster) + (usize::from(cluster) >> 1);
        let lo = u16::from(self.fat_byte(offset, FAT1_SECTOR));
        let hi = u16::from(self.fat_byte(offset + 1, FAT1_SECTOR));
        let word = lo | (hi << 8);
        if cluster & 1 == 0 {
            word & 0xFFF
        } else {
            word >> 4
        }
    }

    /// read-modify-write of the 12-bit entry, mirrored into both FATs
    pub fn fat_set(&mut self, cluster: u16, value: u16) {
        let offset = usize::from(cluster) + (usize::from(cluster) >> 1);
        for fat_start in &[FAT1_SECTOR, FAT2_SECTOR] {
            let lo = u16::from(self.fat_byte(offset, *fat_start));
            let hi = u16::from(self.fat_byte(offset + 1, *fat_start));
            let mut word = lo | (hi << 8);
            if cluster & 1 == 0 {
                word = (word & 0xF000) | (value & 0xFFF);
            } else {
                word = (word & 0x000F) | ((value & 0xFFF) << 4);
            }
            self.set_fat_byte(offset, *fat_start, (word & 0xFF) as u8);
            self.set_fat_byte(offset + 1, *fat_start, (word >> 8) as u8);
        }
    }

    /// linear scan for the first free cluster, no free list
    fn alloc_cluster(&mut self) -> Option<u16> {
        (2..MAX_CLUSTER).find(|c| self.fat_get(*c) == 0)
    }

    /// the cluster chain starting at `first`
    fn chain(&mut self, first: u16) -> Vec<u16> {
        let mut chain = Vec::new();
        let mut cluster = first;
        while (2..MAX_CLUSTER).contains(&cluster) {
            if chain.contains(&cluster) {
                debug!("fat12: cycle in cluster chain at {}", cluster);
                break;
            }
            chain.push(cluster);
            cluster = self.fat_get(cluster);
            if cluster >= CHAIN_END {
                break;
            }
        }
        chain
    }

    fn free_chain(&mut self, first: u16) {
        if first < 2 {
            return;
        }
        for cluster in self.chain(first) {
            self.fat_set(cluster, 0);
        }
    }

    /// allocates a chain for `data` and writes it out, zero-filling the tail
    /// of the last sector. returns the first cluster, 0 for an empty file.
    fn alloc_chain(&mut self, data: &[u8]) -> Result<u16, FsError> {
        if data.is_empty() {
            return Ok(0);
        }
        let mut first = 0u16;
        let mut prev = 0u16;
        for chunk in data.chunks(SECTOR_SIZE) {
            let cluster = match self.alloc_cluster() {
                Some(c) => c,
                None => {
                    self.free_chain(first);
                    return Err(FsError::DiskFull);
                }
            };
            self.fat_set(cluster, 0xFFF);
            if prev != 0 {
                self.fat_set(prev, cluster);
            } else {
                first = cluster;
            }
            let sector = self.cache.sector_mut(cluster_to_lba(cluster));
            sector[..chunk.len()].copy_from_slice(chunk);
            for b in sector[chunk.len()..].iter_mut() {
                *b = 0;
            }
            prev = cluster;
        }
        Ok(first)
    }

    // --- directories ------------------------------------------------------

    /// walks path components from the root, case-insensitively
    fn resolve_dir(&mut self, path: &[String]) -> Result<DirLoc, FsError> {
        let mut loc = DirLoc::Root;
        for component in path {
            let entry = self
                .find_entry(loc, component)
                .ok_or(FsError::PathNotFound)?
                .2;
            if !entry.is_directory() {
                return Err(FsError::PathNotFound);
            }
            loc = DirLoc::Cluster(entry.first_cluster);
        }
        Ok(loc)
    }

    /// the sectors holding a directory's 32-byte slots, in order
    fn dir_sectors(&mut self, loc: DirLoc) -> Vec<u16> {
        match loc {
            DirLoc::Root => (ROOT_DIR_SECTOR..DATA_START_SECTOR).collect(),
            DirLoc::Cluster(first) => self.chain(first).iter().map(|c| cluster_to_lba(*c)).collect(),
        }
    }

    /// decodes the live entries of a directory as (sector, byte offset, entry).
    /// a first byte of 0x00 terminates, 0xE5 marks deleted, attribute 0x0F
    /// is a long-name fragment; all three are skipped.
    fn entries(&mut self, loc: DirLoc) -> Vec<(u16, usize, DirEntry)> {
        let mut res = Vec::new();
        for sector in self.dir_sectors(loc) {
            for slot in 0..(SECTOR_SIZE / DIR_ENTRY_SIZE) {
                let offset = slot * DIR_ENTRY_SIZE;
                let first = self.cache.read_u8(sector, offset);
                if first == 0x00 {
                    return res;
                }
                if first == 0xE5 {
                    continue;
                }
                let raw: Vec<u8> = self.cache.sector(sector)[offset..offset + DIR_ENTRY_SIZE].to_vec();
                if raw[11] == ATTR_LONG_NAME {
                    continue;
                }
                res.push((sector, offset, decode_entry(&raw)));
            }
        }
        res
    }

    fn find_entry(&mut self, loc: DirLoc, name: &str) -> Option<(u16, usize, DirEntry)> {
        let wanted = name.to_ascii_uppercase();
        self.entries(loc).into_iter().find(|(_, _, e)| e.name == wanted)
    }

    /// first free slot (never-used or deleted) of a directory
    fn free_slot(&mut self, loc: DirLoc) -> Option<(u16, usize)> {
        for sector in self.dir_sectors(loc) {
            for slot in 0..(SECTOR_SIZE / DIR_ENTRY_SIZE) {
                let offset = slot * DIR_ENTRY_SIZE;
                let first = self.cache.read_u8(sector, offset);
                if first == 0x00 || first == 0xE5 {
                    return Some((sector, offset));
                }
            }
        }
        None
    }

    fn write_slot(&mut self, slot: (u16, usize), raw: &[u8; DIR_ENTRY_SIZE]) {
        let (sector, offset) = slot;
        self.cache.sector_mut(sector)[offset..offset + DIR_ENTRY_SIZE].copy_from_slice(raw);
    }

    /// deletes the named entry of a directory, freeing its chain.
    /// does not flush. returns whether the entry existed.
    fn remove_entry(&mut self, loc: DirLoc, name: &str) -> bool {
        match self.find_entry(loc, name) {
            Some((sector, offset, entry)) => {
                self.cache.write_u8(sector, offset, 0xE5);
                self.free_chain(entry.first_cluster);
                true
            }
            None => false,
        }
    }

    fn timestamp(&self) -> (u16, u16) {
        if self.deterministic {
            // DOS epoch, 1980-01-01 00:00:00
            return (0, (1 << 5) | 1);
        }
        let now = Local::now();
        let time = (now.hour() as u16) << 11 | (now.minute() as u16) << 5 | (now.second() as u16 / 2);
        let date = ((now.year() as u16).saturating_sub(1980)) << 9
            | (now.month() as u16) << 5
            | now.day() as u16;
        (time, date)
    }
}

/// first data cluster is 2 and maps to the first sector after the root dir
pub fn cluster_to_lba(cluster: u16) -> u16 {
    DATA_START_SECTOR + (cluster - 2)
}

/// encodes a filename to the 11-byte 8.3 on-disk form, space padded.
/// overlong parts are truncated the way DOS truncates them.
pub fn encode_83(name: &str) -> [u8; 11] {
    let upper = name.to_ascii_uppercase();
    let (base, ext) = match upper.rfind('.') {
        Some(idx) if idx > 0 => (&upper[..idx], &upper[idx + 1..]),
        _ => (&upper[..], ""),
    };
    let mut raw = [b' '; 11];
    for (i, b) in base.bytes().take(8).enumerate() {
        raw[i] = b;
    }
    for (i, b) in ext.bytes().take(3).enumerate() {
        raw[8 + i] = b;
    }
    raw
}

/// reconstructs "NAME.EXT" from the 11-byte on-disk form
pub fn decode_83(raw: &[u8]) -> String {
    let base: String = raw[0..8].iter().map(|b| *b as char).collect();
    let ext: String = raw[8..11].iter().map(|b| *b as char).collect();
    let base = base.trim_end_matches(' ');
    let ext = ext.trim_end_matches(' ');
    if ext.is_empty() {
        base.to_string()
    } else {
        format!("{}.{}", base, ext)
    }
}

fn pad_label(label: &str) -> [u8; 11] {
    let mut raw = [b' '; 11];
    for (i, b) in label.to_ascii_uppercase().bytes().take(11).enumerate() {
        raw[i] = b;
    }
    raw
}

fn encode_entry(name83: &[u8; 11], attr: u8, time: u16, date: u16, first_cluster: u16, size: u32) -> [u8; DIR_ENTRY_SIZE] {
    let mut raw = [0u8; DIR_ENTRY_SIZE];
    raw[0..11].copy_from_slice(name83);
    raw[11] = attr;
    raw[22..24].copy_from_slice(&time.to_le_bytes());
    raw[24..26].copy_from_slice(&date.to_le_bytes());
    raw[26..28].copy_from_slice(&first_cluster.to_le_bytes());
    raw[28..32].copy_from_slice(&size.to_le_bytes());
    raw
}

fn decode_entry(raw: &[u8]) -> DirEntry {
    DirEntry {
        name: decode_83(&raw[0..11]),
        attr: raw[11],
        time: u16::from_le_bytes([raw[22], raw[23]]),
        date: u16::from_le_bytes([raw[24], raw[25]]),
        first_cluster: u16::from_le_bytes([raw[26], raw[27]]),
        size: u32::from_le_bytes([raw[28], raw[29], raw[30], raw[31]]),
    }
}
