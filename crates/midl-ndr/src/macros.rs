//! Struct codec generation

/// Implement [`NdrEncode`](crate::NdrEncode) and [`NdrDecode`](crate::NdrDecode)
/// for a plain struct.
///
/// Fields are written in the order listed, the struct aligns to its most
/// aligned field, and pointer fields are resolved in the same order.
/// Conformant structs (trailing conformant array) need the conformance
/// hoisted in front and are written by hand instead.
///
/// ```
/// use midl_ndr::{ndr_struct, UniquePtr, NdrWString};
///
/// #[derive(Debug, Default)]
/// struct KeyInfo {
///     handle: u32,
///     path: UniquePtr<NdrWString>,
/// }
///
/// ndr_struct!(KeyInfo { handle: u32, path: UniquePtr<NdrWString> });
/// ```
#[macro_export]
macro_rules! ndr_struct {
    ($name:ident { $($field:ident : $ty:ty),* $(,)? }) => {
        impl $crate::NdrEncode for $name {
            fn ndr_encode<'a>(&'a self, w: &mut $crate::NdrWriter<'a>) -> $crate::Result<()> {
                w.align(<Self as $crate::NdrEncode>::ndr_align());
                $( $crate::NdrEncode::ndr_encode(&self.$field, w)?; )*
                Ok(())
            }

            fn ndr_align() -> usize {
                let align = 1usize;
                $( let align = align.max(<$ty as $crate::NdrEncode>::ndr_align()); )*
                align
            }
        }

        impl $crate::NdrDecode for $name {
            fn ndr_decode(r: &mut $crate::NdrReader) -> $crate::Result<Self> {
                r.align(<Self as $crate::NdrDecode>::ndr_align())?;
                Ok(Self {
                    $( $field: <$ty as $crate::NdrDecode>::ndr_decode(r)?, )*
                })
            }

            fn ndr_align() -> usize {
                let align = 1usize;
                $( let align = align.max(<$ty as $crate::NdrDecode>::ndr_align()); )*
                align
            }

            fn ndr_min_size() -> usize {
                0 $( + <$ty as $crate::NdrDecode>::ndr_min_size() )*
            }

            fn ndr_resolve(&mut self, r: &mut $crate::NdrReader) -> $crate::Result<()> {
                $( $crate::NdrDecode::ndr_resolve(&mut self.$field, r)?; )*
                Ok(())
            }
        }
    };
}
