//! Serialization for adaptive templates
//!
//! Little-endian binary format with explicit fields. The paired integer
//! templates embed in their own format (see [`crate::inttemp::serial`]);
//! the adaptive records follow, one block per class.
//!
//! ```text
//! u32  nonempty class count
//! u32  permanent class count
//! embedded integer templates
//! per class:
//!   u8  permanent config count, u32 max seen
//!   16 x u32 permanent-proto bits
//!   2 x u32 permanent-config bits
//!   u32 temp proto count
//!   per temp proto: u16 proto id, f32 x, y, length, angle, a, b, c
//!   per allocated config, selected by the permanent-config bit:
//!     perm: u32 ambig count, u32 x N ambig class ids, i32 font id
//!     temp: u32 seen count, u16 max proto id,
//!           ceil((max proto id + 1)/32) x u32 proto bits, i32 font id
//! ```
//!
//! # See also
//!
//! C Tesseract: `ReadAdaptedTemplates()`, `WriteAdaptedTemplates()` in
//! `adaptive.cpp`

use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::adapttemp::{
    AdaptClass, AdaptiveTemplates, ConfigState, PermConfig, TempConfig, TempProto,
};
use crate::bitvec::{BitVec, words_for_bits};
use crate::error::{Error, Result};
use crate::inttemp::serial::{
    read_f32, read_i32, read_u8, read_u16, read_u32, write_f32, write_i32, write_u8, write_u16,
    write_u32,
};
use crate::inttemp::{IntTemplates, MAX_NUM_CONFIGS, MAX_NUM_PROTOS};
use crate::proto::Proto;

impl AdaptiveTemplates {
    /// Read an adaptive store from a reader.
    pub fn read_from_reader(reader: &mut impl Read) -> Result<Self> {
        let num_nonempty_classes = read_u32(reader)? as usize;
        let num_perm_classes = read_u32(reader)? as usize;
        let templates = IntTemplates::read_from_reader(reader)?;

        let num_classes = templates.num_classes();
        if num_nonempty_classes > num_classes || num_perm_classes > num_classes {
            return Err(Error::InvalidFormat(format!(
                "{num_nonempty_classes} nonempty / {num_perm_classes} permanent classes \
                 in a store of {num_classes}"
            )));
        }

        let mut classes = Vec::with_capacity(num_classes);
        for class_id in 0..num_classes {
            let num_configs = templates.class(class_id).num_configs();
            classes.push(read_class(reader, num_configs, num_classes)?);
        }

        Ok(AdaptiveTemplates {
            templates,
            num_nonempty_classes,
            num_perm_classes,
            classes,
        })
    }

    /// Read an adaptive store from a file.
    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::read_from_reader(&mut BufReader::new(file))
    }

    /// Read an adaptive store from a byte slice.
    pub fn read_from_bytes(data: &[u8]) -> Result<Self> {
        let mut slice = data;
        Self::read_from_reader(&mut slice)
    }

    /// Write the adaptive store.
    pub fn write_to_writer(&self, writer: &mut impl Write) -> Result<()> {
        write_u32(writer, self.num_nonempty_classes() as u32)?;
        write_u32(writer, self.num_perm_classes() as u32)?;
        self.templates().write_to_writer(writer)?;
        for class in self.classes() {
            write_class(writer, class)?;
        }
        Ok(())
    }

    /// Write the adaptive store to a file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        self.write_to_writer(&mut writer)
    }

    /// Write the adaptive store to a byte vector.
    pub fn write_to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write_to_writer(&mut buf)?;
        Ok(buf)
    }
}

// ============================================================================
// Internal helpers
// ============================================================================

fn read_class(reader: &mut impl Read, num_configs: usize, num_classes: usize) -> Result<AdaptClass> {
    let num_perm_configs = read_u8(reader)? as usize;
    let max_seen = read_u32(reader)?;
    let perm_protos = read_bits(reader, MAX_NUM_PROTOS)?;
    let perm_configs = read_bits(reader, MAX_NUM_CONFIGS)?;

    let num_temp_protos = read_u32(reader)? as usize;
    if num_temp_protos > MAX_NUM_PROTOS {
        return Err(Error::InvalidFormat(format!(
            "class lists {num_temp_protos} temp protos"
        )));
    }
    let mut temp_protos = Vec::with_capacity(num_temp_protos);
    for _ in 0..num_temp_protos {
        let proto_id = read_u16(reader)? as usize;
        if proto_id >= MAX_NUM_PROTOS {
            return Err(Error::IndexOutOfBounds {
                index: proto_id,
                len: MAX_NUM_PROTOS,
            });
        }
        let proto = Proto {
            x: read_f32(reader)?,
            y: read_f32(reader)?,
            length: read_f32(reader)?,
            angle: read_f32(reader)?,
            a: read_f32(reader)?,
            b: read_f32(reader)?,
            c: read_f32(reader)?,
        };
        temp_protos.push(TempProto { proto_id, proto });
    }

    let mut configs = Vec::with_capacity(num_configs);
    for config_id in 0..num_configs {
        if perm_configs.test(config_id) {
            configs.push(ConfigState::Perm(read_perm_config(reader, num_classes)?));
        } else {
            configs.push(ConfigState::Temp(read_temp_config(reader)?));
        }
    }

    Ok(AdaptClass {
        num_perm_configs,
        max_seen,
        perm_protos,
        perm_configs,
        temp_protos,
        configs,
    })
}

fn write_class(writer: &mut impl Write, class: &AdaptClass) -> Result<()> {
    write_u8(writer, class.num_perm_configs() as u8)?;
    write_u32(writer, class.max_seen())?;
    write_bits(writer, class.perm_protos())?;
    write_bits(writer, class.perm_configs())?;

    write_u32(writer, class.temp_protos().len() as u32)?;
    for tp in class.temp_protos() {
        write_u16(writer, tp.proto_id as u16)?;
        write_f32(writer, tp.proto.x)?;
        write_f32(writer, tp.proto.y)?;
        write_f32(writer, tp.proto.length)?;
        write_f32(writer, tp.proto.angle)?;
        write_f32(writer, tp.proto.a)?;
        write_f32(writer, tp.proto.b)?;
        write_f32(writer, tp.proto.c)?;
    }

    for state in class.configs() {
        match state {
            ConfigState::Perm(config) => write_perm_config(writer, config)?,
            ConfigState::Temp(config) => write_temp_config(writer, config)?,
        }
    }
    Ok(())
}

fn read_perm_config(reader: &mut impl Read, num_classes: usize) -> Result<PermConfig> {
    let num_ambigs = read_u32(reader)? as usize;
    if num_ambigs > num_classes {
        return Err(Error::InvalidFormat(format!(
            "permanent config lists {num_ambigs} ambigs"
        )));
    }
    let mut ambigs = Vec::with_capacity(num_ambigs);
    for _ in 0..num_ambigs {
        let class_id = read_u32(reader)? as usize;
        if class_id >= num_classes {
            return Err(Error::IndexOutOfBounds {
                index: class_id,
                len: num_classes,
            });
        }
        ambigs.push(class_id);
    }
    let font_id = read_i32(reader)?;
    Ok(PermConfig { ambigs, font_id })
}

fn write_perm_config(writer: &mut impl Write, config: &PermConfig) -> Result<()> {
    write_u32(writer, config.ambigs.len() as u32)?;
    for &class_id in &config.ambigs {
        write_u32(writer, class_id as u32)?;
    }
    write_i32(writer, config.font_id)?;
    Ok(())
}

fn read_temp_config(reader: &mut impl Read) -> Result<TempConfig> {
    let seen = read_u32(reader)?;
    let max_proto_id = read_u16(reader)? as usize;
    if max_proto_id >= MAX_NUM_PROTOS {
        return Err(Error::IndexOutOfBounds {
            index: max_proto_id,
            len: MAX_NUM_PROTOS,
        });
    }
    let protos = read_bits(reader, max_proto_id + 1)?;
    let font_id = read_i32(reader)?;
    Ok(TempConfig {
        seen,
        max_proto_id,
        protos,
        font_id,
    })
}

fn write_temp_config(writer: &mut impl Write, config: &TempConfig) -> Result<()> {
    write_u32(writer, config.seen())?;
    write_u16(writer, config.max_proto_id() as u16)?;
    write_bits(writer, config.protos())?;
    write_i32(writer, config.font_id())?;
    Ok(())
}

fn read_bits(reader: &mut impl Read, num_bits: usize) -> Result<BitVec> {
    let mut words = vec![0u32; words_for_bits(num_bits)];
    for word in words.iter_mut() {
        *word = read_u32(reader)?;
    }
    Ok(BitVec::from_words(words, num_bits))
}

fn write_bits(writer: &mut impl Write, bits: &BitVec) -> Result<()> {
    for &word in bits.words() {
        write_u32(writer, word)?;
    }
    Ok(())
}
