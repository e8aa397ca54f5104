//! Options Connectomist takes as an index into a fixed list of names.

/// Declares an enum mapping API names to Connectomist indices.
///
/// One variant must carry `#[default]`. The generated type has `ALL`,
/// `id()`, `name()`, `names()`, `Display` and a `FromStr` failing with
/// [`connectomist_core::Error::Validation`]. Extra names after `|` are
/// accepted by `FromStr` only.
macro_rules! connectomist_choice {
    (
        $(#[$meta:meta])*
        pub enum $name:ident ($what:literal) {
            $(
                $(#[$vmeta:meta])*
                $variant:ident = ($label:literal $(| $alias:literal)*, $id:literal)
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                $variant,
            )+
        }

        impl $name {
            /// Every value, in Connectomist index order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The index Connectomist expects.
            pub fn id(self) -> i64 {
                match self {
                    $($name::$variant => $id,)+
                }
            }

            /// The name used by the package API.
            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }

            /// All accepted names, aliases excluded.
            pub fn names() -> Vec<&'static str> {
                Self::ALL.iter().map(|value| value.name()).collect()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }

        impl std::str::FromStr for $name {
            type Err = connectomist_core::Error;

            fn from_str(s: &str) -> connectomist_core::Result<Self> {
                match s {
                    $($label $(| $alias)* => Ok($name::$variant),)+
                    _ => Err(connectomist_core::Error::validation(format!(
                        "'{s}' {} not supported (must be in {:?}).",
                        $what,
                        Self::names()
                    ))),
                }
            }
        }
    };
}

pub(crate) use connectomist_choice;
