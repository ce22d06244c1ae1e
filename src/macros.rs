//! small helper macros shared across the crate.

/// evaluates to the bare name of the enclosing function, eg `make_transfer`.
macro_rules! fn_name_bare {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            std::any::type_name::<T>()
        }
        type_name_of(f)
            .rsplit("::")
            .find(|&part| part != "f" && part != "{{closure}}")
            .unwrap_or("?")
    }};
}

/// evaluates to the name of the enclosing function with trailing parens, eg
/// `make_transfer()`.  Used as a prefix for log lines.
macro_rules! fn_name {
    () => {{
        format!("{}()", $crate::macros::fn_name_bare!())
    }};
}

/// defines a 32-byte newtype with hex `Debug`/`Display`, serde support and
/// byte accessors.  Ledger identifiers (hashes, keys, nonces) all share this
/// shape.
macro_rules! bytes32_newtype {
    ($(#[$meta:meta])* $vis:vis struct $name:ident;) => {
        $(#[$meta])*
        #[derive(
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[cfg_attr(any(test, feature = "arbitrary-impls"), derive(arbitrary::Arbitrary))]
        $vis struct $name([u8; 32]);

        impl $name {
            pub const fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({}…)", stringify!($name), &self.to_hex()[..12])
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }
    };
}

// These allow the macros to be used as
// use crate::macros::xxxxx;
//
// see: https://stackoverflow.com/a/67140319/10087197

#[allow(unused_imports)]
pub(crate) use bytes32_newtype;
#[allow(unused_imports)]
pub(crate) use fn_name;
#[allow(unused_imports)]
pub(crate) use fn_name_bare;

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {

    use super::*;

    bytes32_newtype! {
        struct Probe;
    }

    #[test]
    fn fn_name_test() {
        assert_eq!(fn_name!(), "fn_name_test()");
    }

    #[tokio::test]
    async fn async_fn_name_test() {
        assert_eq!(fn_name!(), "async_fn_name_test()");
    }

    #[test]
    fn newtype_debug_is_abbreviated() {
        let probe = Probe::from_bytes([0xab; 32]);
        assert_eq!(format!("{probe:?}"), "Probe(abababababab…)");
        assert_eq!(probe.to_string().len(), 64);
    }
}
