//! Closed enumerations with a bidirectional name/value table.
//!
//! Domain logic matches on the enum variants directly. Names are only looked
//! up when text arrives from outside (service inputs, HTTP bodies).

use std::collections::HashMap;

/// A closed enumeration whose variants carry a stable name and numeric value.
///
/// Implement through [`smart_enum!`](crate::smart_enum), which also provides
/// the per-type lookup table.
pub trait SmartEnum: Copy + Eq + Send + Sync + 'static {
    /// Every variant, in declaration order.
    const ALL: &'static [Self];

    fn name(&self) -> &'static str;

    fn value(&self) -> i32;

    /// Lookup table for this type, built on first use.
    fn table() -> &'static NameTable<Self>;

    /// Resolves a variant by name.
    fn from_name(name: &str, ignore_case: bool) -> Option<Self> {
        Self::table().from_name(name, ignore_case)
    }

    fn from_value(value: i32) -> Option<Self> {
        Self::table().from_value(value)
    }

    /// All variant names in declaration order.
    fn names() -> &'static [&'static str] {
        Self::table().names()
    }
}

/// Name/value index over the variants of one [`SmartEnum`].
#[derive(Debug)]
pub struct NameTable<T: 'static> {
    by_name: HashMap<&'static str, T>,
    by_folded_name: HashMap<String, T>,
    by_value: HashMap<i32, T>,
    names: Vec<&'static str>,
}

impl<T: SmartEnum> NameTable<T> {
    /// Indexes every variant of `T`.
    pub fn build() -> Self {
        let mut table = Self {
            by_name: HashMap::with_capacity(T::ALL.len()),
            by_folded_name: HashMap::with_capacity(T::ALL.len()),
            by_value: HashMap::with_capacity(T::ALL.len()),
            names: Vec::with_capacity(T::ALL.len()),
        };

        for variant in T::ALL {
            let name = variant.name();
            table.by_name.insert(name, *variant);
            table.by_folded_name.insert(name.to_ascii_lowercase(), *variant);
            table.by_value.insert(variant.value(), *variant);
            table.names.push(name);
        }

        table
    }

    pub fn from_name(&self, name: &str, ignore_case: bool) -> Option<T> {
        let name = name.trim();
        if ignore_case {
            self.by_folded_name.get(&name.to_ascii_lowercase()).copied()
        } else {
            self.by_name.get(name).copied()
        }
    }

    pub fn from_value(&self, value: i32) -> Option<T> {
        self.by_value.get(&value).copied()
    }

    pub fn names(&self) -> &[&'static str] {
        &self.names
    }
}

/// Declares a closed enumeration and implements [`SmartEnum`] and `Display`
/// for it.
///
/// The calling crate must depend on `serde` with the `derive` feature.
///
/// ```ignore
/// smart_enum! {
///     pub enum LicenseLevel {
///         Rookie = 1,
///         Veteran = 2,
///     }
/// }
/// ```
#[macro_export]
macro_rules! smart_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident = $value:expr
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $(
                $(#[$vmeta])*
                $variant,
            )+
        }

        impl $crate::SmartEnum for $name {
            const ALL: &'static [Self] = &[$($name::$variant),+];

            fn name(&self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant),)+
                }
            }

            fn value(&self) -> i32 {
                match self {
                    $($name::$variant => $value,)+
                }
            }

            fn table() -> &'static $crate::NameTable<Self> {
                static TABLE: std::sync::LazyLock<$crate::NameTable<$name>> =
                    std::sync::LazyLock::new($crate::NameTable::build);
                &TABLE
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str($crate::SmartEnum::name(self))
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::smart_enum! {
        #[derive(Default)]
        enum Shield {
            #[default]
            Deflector = 1,
            Plasma = 2,
            Quantum = 7,
        }
    }

    #[test]
    fn names_and_values_follow_declaration() {
        assert_eq!(Shield::names(), &["Deflector", "Plasma", "Quantum"]);
        assert_eq!(Shield::Quantum.value(), 7);
        assert_eq!(Shield::Plasma.to_string(), "Plasma");
        assert_eq!(Shield::default(), Shield::Deflector);
    }

    #[test]
    fn case_sensitive_lookup_rejects_other_casing() {
        assert_eq!(Shield::from_name("Plasma", false), Some(Shield::Plasma));
        assert_eq!(Shield::from_name("plasma", false), None);
    }

    #[test]
    fn case_insensitive_lookup_folds_and_trims() {
        assert_eq!(Shield::from_name("  qUaNtUm ", true), Some(Shield::Quantum));
        assert_eq!(Shield::from_name("warp", true), None);
    }

    #[test]
    fn value_lookup() {
        assert_eq!(Shield::from_value(1), Some(Shield::Deflector));
        assert_eq!(Shield::from_value(3), None);
    }

    #[test]
    fn table_is_built_once() {
        let a = Shield::table() as *const NameTable<Shield>;
        let b = Shield::table() as *const NameTable<Shield>;
        assert_eq!(a, b);
    }
}
