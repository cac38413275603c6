//! Server-side filter queries.
//!
//! A [`Query`] is read from the config file using the human labels of the
//! catalog enumerations (`field = "Genres"`) and sent to Kavita using their
//! numeric codes (`"field": 18`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when a label does not name any variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("couldn't convert '{label}' to {kind}")]
pub struct UnknownLabel {
    kind: &'static str,
    label: String,
}

macro_rules! catalog_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $code:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "u8")]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
        }

        impl $name {
            /// Every variant, in code order.
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            /// Label used in configuration files.
            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant),)+
                }
            }

            /// Code sent to the server.
            pub fn code(self) -> u8 {
                match self {
                    $($name::$variant => $code,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownLabel;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.label() == s)
                    .ok_or_else(|| UnknownLabel {
                        kind: stringify!($name),
                        label: s.to_string(),
                    })
            }
        }

        impl TryFrom<String> for $name {
            type Error = UnknownLabel;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> u8 {
                value.code()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

catalog_enum! {
    /// Series metadata field a filter applies to.
    FilterField {
        /// Series summary text.
        Summary = 0,
        /// Series name.
        SeriesName = 1,
        /// Publication status.
        PublicationStatus = 2,
        /// Languages.
        Languages = 3,
        /// Age rating.
        AgeRating = 4,
        /// User rating.
        UserRating = 5,
        /// Tags.
        Tags = 6,
        /// Collection tags.
        CollectionTags = 7,
        /// Translators.
        Translators = 8,
        /// Characters.
        Characters = 9,
        /// Publisher.
        Publisher = 10,
        /// Editor.
        Editor = 11,
        /// Cover artist.
        CoverArtist = 12,
        /// Letterer.
        Letterer = 13,
        /// Colorist.
        Colorist = 14,
        /// Inker.
        Inker = 15,
        /// Penciller.
        Penciller = 16,
        /// Writers.
        Writers = 17,
        /// Genres.
        Genres = 18,
        /// Libraries.
        Libraries = 19,
        /// Read progress.
        ReadProgress = 20,
        /// File formats.
        Formats = 21,
        /// Release year.
        ReleaseYear = 22,
        /// Estimated read time.
        ReadTime = 23,
    }
}

catalog_enum! {
    /// Comparison operator of a filter.
    Comparison {
        /// Equal.
        Equal = 0,
        /// Greater than.
        GreaterThan = 1,
        /// Greater than or equal.
        GreaterThanEqual = 2,
        /// Less than.
        LessThan = 3,
        /// Less than or equal.
        LessThanEqual = 4,
        /// Contains.
        Contains = 5,
        /// Matches.
        Matches = 6,
        /// Does not contain.
        NotContains = 7,
        /// Not equal.
        NotEqual = 9,
        /// Begins with.
        BeginsWith = 10,
        /// Ends with.
        EndsWith = 11,
        /// Date is before.
        IsBefore = 12,
        /// Date is after.
        IsAfter = 13,
        /// Within the last N days.
        IsInLast = 14,
        /// Not within the last N days.
        IsNotInLast = 15,
    }
}

catalog_enum! {
    /// How the filters of a query are combined.
    FilterCombination {
        /// Any filter may match.
        Or = 0,
        /// Every filter must match.
        And = 1,
    }
}

/// A single filter statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    /// Field to filter on.
    pub field: FilterField,
    /// Comparison operator.
    pub comparison: Comparison,
    /// Value to compare against.
    pub value: String,
}

/// A named query; its name doubles as the shelf name on the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// Query name.
    pub name: String,

    /// How filters combine.
    #[serde(rename(serialize = "combination", deserialize = "join_type"))]
    pub join_type: FilterCombination,

    /// Ordered filters.
    #[serde(
        default,
        rename(serialize = "statements", deserialize = "filters")
    )]
    pub filters: Vec<Filter>,
}
