//! Serialization for integer templates
//!
//! Little-endian binary format, versioned through a negated version id
//! so old readers that treated the field as a class count fail cleanly.
//!
//! ```text
//! u32  unicharset size
//! i32  -version            (non-negative means a version-0 file)
//! u32  class pruner count
//! u32  class count
//! per pruner: 24*24*24*2 x u32
//! per class:
//!   u16 proto count, u8 proto set count, u8 config count
//!   u16 x N config lengths   (N: 32 for v2, 64 for v3, config count for v4+)
//!   u8  x (proto set count * 64) proto lengths
//!   per proto set:
//!     3*64*2 x u32 proto pruner
//!     64 protos: i8 a, u8 b, i8 c, u8 angle, u32 x W configs
//!                              (W: 1 for v2, 2 for v3+)
//!   i32 font set id           (v4+ only; -1 before)
//! ```
//!
//! Versions 0 and 1 used index-mapped pruner tables and are not
//! supported. The font side tables that trailed original version 4+
//! files are not part of this store.
//!
//! # See also
//!
//! C Tesseract: `ReadIntTemplates()`, `WriteIntTemplates()` in
//! `intproto.cpp`

use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::inttemp::{
    CLASSES_PER_CP, ClassPruner, IntClass, IntProto, IntTemplates, MAX_NUM_CLASSES,
    MAX_NUM_CONFIGS, MAX_NUM_PROTO_SETS, NUM_CP_BUCKETS, NUM_PP_BUCKETS, NUM_PP_PARAMS,
    PROTOS_PER_PROTO_SET, ProtoSet, WERDS_PER_CP_VECTOR, WERDS_PER_PP_VECTOR,
};

/// Version written by this crate.
const INT_TEMPLATES_VERSION: i32 = 5;

/// Oldest version the reader accepts.
const MIN_INT_TEMPLATES_VERSION: i32 = 2;

/// Config capacity of version-2 files.
const OLD_MAX_NUM_CONFIGS: usize = 32;

impl IntTemplates {
    /// Read templates from a reader.
    pub fn read_from_reader(reader: &mut impl Read) -> Result<Self> {
        let _unicharset_size = read_u32(reader)?;
        let version_field = read_i32(reader)?;
        let num_class_pruners = read_u32(reader)? as usize;

        if version_field >= 0 {
            // version-0 header: the field held the class count
            return Err(Error::UnsupportedVersion(0));
        }
        let version = -version_field;
        if !(MIN_INT_TEMPLATES_VERSION..=INT_TEMPLATES_VERSION).contains(&version) {
            return Err(Error::UnsupportedVersion(version));
        }
        let num_classes = read_u32(reader)? as usize;

        if num_classes > MAX_NUM_CLASSES {
            return Err(Error::InvalidFormat(format!(
                "class count {num_classes} exceeds maximum {MAX_NUM_CLASSES}"
            )));
        }
        if num_class_pruners != num_classes.div_ceil(CLASSES_PER_CP) {
            return Err(Error::InvalidFormat(format!(
                "{num_class_pruners} class pruners for {num_classes} classes"
            )));
        }

        let mut class_pruners = Vec::with_capacity(num_class_pruners);
        for _ in 0..num_class_pruners {
            class_pruners.push(read_class_pruner(reader)?);
        }

        let mut classes = Vec::with_capacity(num_classes.min(4096));
        for _ in 0..num_classes {
            classes.push(read_class(reader, version)?);
        }

        Ok(IntTemplates {
            classes,
            class_pruners,
        })
    }

    /// Read templates from a file.
    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::read_from_reader(&mut BufReader::new(file))
    }

    /// Read templates from a byte slice.
    pub fn read_from_bytes(data: &[u8]) -> Result<Self> {
        let mut slice = data;
        Self::read_from_reader(&mut slice)
    }

    /// Write templates in the current format version.
    pub fn write_to_writer(&self, writer: &mut impl Write) -> Result<()> {
        write_u32(writer, self.num_classes() as u32)?;
        write_i32(writer, -INT_TEMPLATES_VERSION)?;
        write_u32(writer, self.num_class_pruners() as u32)?;
        write_u32(writer, self.num_classes() as u32)?;

        for pruner in self.class_pruners() {
            write_class_pruner(writer, pruner)?;
        }
        for class in self.classes() {
            write_class(writer, class)?;
        }
        Ok(())
    }

    /// Write templates to a file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        self.write_to_writer(&mut writer)
    }

    /// Write templates to a byte vector.
    pub fn write_to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write_to_writer(&mut buf)?;
        Ok(buf)
    }
}

// ============================================================================
// Internal helpers
// ============================================================================

fn read_class_pruner(reader: &mut impl Read) -> Result<ClassPruner> {
    let mut pruner = ClassPruner::new();
    for x in 0..NUM_CP_BUCKETS {
        for y in 0..NUM_CP_BUCKETS {
            for angle in 0..NUM_CP_BUCKETS {
                for word in 0..WERDS_PER_CP_VECTOR {
                    pruner.set_word(x, y, angle, word, read_u32(reader)?);
                }
            }
        }
    }
    Ok(pruner)
}

fn write_class_pruner(writer: &mut impl Write, pruner: &ClassPruner) -> Result<()> {
    for x in 0..NUM_CP_BUCKETS {
        for y in 0..NUM_CP_BUCKETS {
            for angle in 0..NUM_CP_BUCKETS {
                for word in 0..WERDS_PER_CP_VECTOR {
                    write_u32(writer, pruner.word(x, y, angle, word))?;
                }
            }
        }
    }
    Ok(())
}

fn read_class(reader: &mut impl Read, version: i32) -> Result<IntClass> {
    let num_protos = read_u16(reader)?;
    let num_proto_sets = read_u8(reader)? as usize;
    let num_configs = read_u8(reader)?;

    if num_proto_sets > MAX_NUM_PROTO_SETS {
        return Err(Error::InvalidFormat(format!(
            "class has {num_proto_sets} proto sets, maximum is {MAX_NUM_PROTO_SETS}"
        )));
    }
    let max_configs = if version < 3 {
        OLD_MAX_NUM_CONFIGS
    } else {
        MAX_NUM_CONFIGS
    };
    if num_configs as usize > max_configs {
        return Err(Error::InvalidFormat(format!(
            "class has {num_configs} configs, maximum is {max_configs}"
        )));
    }
    if num_protos as usize > num_proto_sets * PROTOS_PER_PROTO_SET {
        return Err(Error::InvalidFormat(format!(
            "class has {num_protos} protos but only {num_proto_sets} proto sets"
        )));
    }

    let stored_lengths = if version < 4 {
        max_configs
    } else {
        num_configs as usize
    };
    let mut config_lengths = [0u16; MAX_NUM_CONFIGS];
    for length in config_lengths.iter_mut().take(stored_lengths) {
        *length = read_u16(reader)?;
    }

    let mut proto_lengths = vec![0u8; num_proto_sets * PROTOS_PER_PROTO_SET];
    reader.read_exact(&mut proto_lengths)?;

    let config_words = if version < 3 { 1 } else { 2 };
    let mut proto_sets = Vec::with_capacity(num_proto_sets);
    for _ in 0..num_proto_sets {
        proto_sets.push(Box::new(read_proto_set(reader, config_words)?));
    }

    let font_set_id = if version < 4 { -1 } else { read_i32(reader)? };

    Ok(IntClass {
        num_protos,
        num_configs,
        proto_sets,
        proto_lengths,
        config_lengths,
        font_set_id,
    })
}

fn write_class(writer: &mut impl Write, class: &IntClass) -> Result<()> {
    write_u16(writer, class.num_protos() as u16)?;
    write_u8(writer, class.num_proto_sets() as u8)?;
    write_u8(writer, class.num_configs() as u8)?;
    for config_id in 0..class.num_configs() {
        write_u16(writer, class.config_length(config_id))?;
    }

    writer.write_all(&class.proto_lengths)?;

    for set in class.proto_sets() {
        write_proto_set(writer, set)?;
    }
    write_i32(writer, class.font_set_id())?;
    Ok(())
}

fn read_proto_set(reader: &mut impl Read, config_words: usize) -> Result<ProtoSet> {
    let mut set = ProtoSet::default();
    for param in 0..NUM_PP_PARAMS {
        for bucket in 0..NUM_PP_BUCKETS {
            for word in 0..WERDS_PER_PP_VECTOR {
                set.proto_pruner[param][bucket][word] = read_u32(reader)?;
            }
        }
    }
    for proto in set.protos.iter_mut() {
        proto.a = read_u8(reader)? as i8;
        proto.b = read_u8(reader)?;
        proto.c = read_u8(reader)? as i8;
        proto.angle = read_u8(reader)?;
        for word in proto.configs.iter_mut().take(config_words) {
            *word = read_u32(reader)?;
        }
    }
    Ok(set)
}

fn write_proto_set(writer: &mut impl Write, set: &ProtoSet) -> Result<()> {
    for param in 0..NUM_PP_PARAMS {
        for bucket in 0..NUM_PP_BUCKETS {
            for word in 0..WERDS_PER_PP_VECTOR {
                write_u32(writer, set.proto_pruner[param][bucket][word])?;
            }
        }
    }
    for proto in &set.protos {
        write_proto(writer, proto)?;
    }
    Ok(())
}

fn write_proto(writer: &mut impl Write, proto: &IntProto) -> Result<()> {
    write_u8(writer, proto.a as u8)?;
    write_u8(writer, proto.b)?;
    write_u8(writer, proto.c as u8)?;
    write_u8(writer, proto.angle)?;
    for &word in &proto.configs {
        write_u32(writer, word)?;
    }
    Ok(())
}

pub(crate) fn read_u8(reader: &mut impl Read) -> Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

pub(crate) fn read_u16(reader: &mut impl Read) -> Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

pub(crate) fn read_u32(reader: &mut impl Read) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub(crate) fn read_i32(reader: &mut impl Read) -> Result<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

pub(crate) fn read_f32(reader: &mut impl Read) -> Result<f32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

pub(crate) fn write_u8(writer: &mut impl Write, value: u8) -> Result<()> {
    writer.write_all(&[value])?;
    Ok(())
}

pub(crate) fn write_u16(writer: &mut impl Write, value: u16) -> Result<()> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub(crate) fn write_u32(writer: &mut impl Write, value: u32) -> Result<()> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub(crate) fn write_i32(writer: &mut impl Write, value: i32) -> Result<()> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub(crate) fn write_f32(writer: &mut impl Write, value: f32) -> Result<()> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitvec::BitVec;
    use crate::proto::Proto;

    fn sample_templates() -> IntTemplates {
        let mut templates = IntTemplates::new();
        let protos_a = vec![
            Proto::from_position(-0.1, 0.3, 0.3, 0.0),
            Proto::from_position(0.1, 0.1, 0.4, 0.25),
        ];
        let mut config_a = BitVec::new(2);
        config_a.set_all();
        templates.add_converted_class(&protos_a, &[config_a]);

        let protos_b = vec![Proto::from_position(0.0, 0.0, 0.5, 0.125)];
        let mut config_b = BitVec::new(1);
        config_b.set(0);
        templates.add_converted_class(&protos_b, &[config_b]);
        templates.class_mut(1).set_font_set_id(3);
        templates
    }

    #[test]
    fn test_roundtrip_through_bytes() {
        let templates = sample_templates();
        let bytes = templates.write_to_bytes().unwrap();
        let restored = IntTemplates::read_from_bytes(&bytes).unwrap();
        assert_eq!(restored, templates);
    }

    #[test]
    fn test_empty_templates_roundtrip() {
        let templates = IntTemplates::new();
        let bytes = templates.write_to_bytes().unwrap();
        let restored = IntTemplates::read_from_bytes(&bytes).unwrap();
        assert_eq!(restored.num_classes(), 0);
        assert_eq!(restored.num_class_pruners(), 0);
    }

    #[test]
    fn test_file_roundtrip() {
        let templates = sample_templates();

        let dir = std::env::temp_dir().join("tessclassify_test_inttemp");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("templates.bin");

        templates.write_to_file(&path).unwrap();
        let restored = IntTemplates::read_from_file(&path).unwrap();
        assert_eq!(restored, templates);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_truncated_data_is_fatal() {
        let bytes = sample_templates().write_to_bytes().unwrap();
        let result = IntTemplates::read_from_bytes(&bytes[..bytes.len() / 2]);
        assert!(result.is_err());
    }

    #[test]
    fn test_version_zero_header_rejected() {
        let mut bytes = Vec::new();
        write_u32(&mut bytes, 10).unwrap(); // unicharset size
        write_i32(&mut bytes, 10).unwrap(); // non-negative: class count field
        write_u32(&mut bytes, 1).unwrap(); // pruner count
        let err = IntTemplates::read_from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, Error::UnsupportedVersion(0)));
    }

    #[test]
    fn test_version_one_rejected() {
        let mut bytes = Vec::new();
        write_u32(&mut bytes, 10).unwrap();
        write_i32(&mut bytes, -1).unwrap();
        write_u32(&mut bytes, 1).unwrap();
        write_u32(&mut bytes, 10).unwrap();
        let err = IntTemplates::read_from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, Error::UnsupportedVersion(1)));
    }

    #[test]
    fn test_future_version_rejected() {
        let mut bytes = Vec::new();
        write_u32(&mut bytes, 10).unwrap();
        write_i32(&mut bytes, -9).unwrap();
        write_u32(&mut bytes, 1).unwrap();
        write_u32(&mut bytes, 10).unwrap();
        let err = IntTemplates::read_from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, Error::UnsupportedVersion(9)));
    }

    #[test]
    fn test_pruner_count_mismatch_rejected() {
        let mut bytes = Vec::new();
        write_u32(&mut bytes, 2).unwrap();
        write_i32(&mut bytes, -5).unwrap();
        write_u32(&mut bytes, 3).unwrap(); // 3 pruners for 2 classes
        write_u32(&mut bytes, 2).unwrap();
        let err = IntTemplates::read_from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)));
    }

    #[test]
    fn test_written_version_field() {
        let bytes = sample_templates().write_to_bytes().unwrap();
        let version = i32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        assert_eq!(version, -5);
    }
}
