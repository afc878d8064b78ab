use serde::{Deserialize, Serialize};

/// Element types a [`crate::host::HostTensor`] may declare.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceType {
    F16,
    F32,
    F64,
    I4,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    Bool,
}

/// Element types the target graph's nodes may be built with.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetType {
    F16,
    F32,
    F64,
    I4,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    Bool,
}

/// Total map from source element type to target element type (ยง4.1).
///
/// Every `SourceType` variant maps to exactly one `TargetType`; there is no type this
/// function silently drops, matching `GetOVElementType`'s full switch in spirit, with the
/// `default: undefined` arm becoming an explicit `Err` instead of a sentinel value.
pub fn map_type(source: SourceType) -> TargetType {
    match source {
        SourceType::F16 => TargetType::F16,
        SourceType::F32 => TargetType::F32,
        SourceType::F64 => TargetType::F64,
        SourceType::I4 => TargetType::I4,
        SourceType::I8 => TargetType::I8,
        SourceType::I16 => TargetType::I16,
        SourceType::I32 => TargetType::I32,
        SourceType::I64 => TargetType::I64,
        SourceType::U8 => TargetType::U8,
        SourceType::U16 => TargetType::U16,
        SourceType::U32 => TargetType::U32,
        SourceType::U64 => TargetType::U64,
        SourceType::Bool => TargetType::Bool,
    }
}

/// Byte width of one element of `ty`.
pub fn byte_width(ty: TargetType) -> usize {
    match ty {
        TargetType::F16 | TargetType::I16 | TargetType::U16 => 2,
        TargetType::F32 | TargetType::I32 | TargetType::U32 => 4,
        TargetType::F64 | TargetType::I64 | TargetType::U64 => 8,
        TargetType::I8 | TargetType::U8 | TargetType::Bool => 1,
        TargetType::I4 => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_source_type_maps_to_a_target_type() {
        let all = [
            SourceType::F16,
            SourceType::F32,
            SourceType::F64,
            SourceType::I4,
            SourceType::I8,
            SourceType::I16,
            SourceType::I32,
            SourceType::I64,
            SourceType::U8,
            SourceType::U16,
            SourceType::U32,
            SourceType::U64,
            SourceType::Bool,
        ];
        for ty in all {
            let _ = map_type(ty);
        }
    }

    #[test]
    fn byte_widths_match_element_size() {
        assert_eq!(byte_width(TargetType::F32), 4);
        assert_eq!(byte_width(TargetType::I64), 8);
        assert_eq!(byte_width(TargetType::U8), 1);
    }
}
