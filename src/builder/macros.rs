//! Macros for ergonomic state declarations.

/// Generate a state enum whose variants convert to and from [`StateValue`].
///
/// Each variant names the value stored in the state field. The enum gets
/// `as_str`, an `ALL` list in declaration order, `From<Enum> for StateValue`
/// and `TryFrom<StateValue>`.
///
/// [`StateValue`]: crate::core::StateValue
///
/// # Example
///
/// ```
/// use statecraft::core::StateValue;
/// use statecraft::state_enum;
///
/// state_enum! {
///     pub enum ReviewState {
///         Draft => "draft",
///         InReview => "in_review",
///         Approved => "approved",
///     }
/// }
///
/// assert_eq!(StateValue::from(ReviewState::InReview), StateValue::from("in_review"));
/// assert_eq!(ReviewState::try_from(StateValue::from("approved")), Ok(ReviewState::Approved));
/// assert!(ReviewState::try_from(StateValue::from("lost")).is_err());
/// ```
#[macro_export]
macro_rules! state_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident => $value:literal
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant
            ),*
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$(Self::$variant),*];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $value),*
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::convert::From<$name> for $crate::core::StateValue {
            fn from(state: $name) -> Self {
                $crate::core::StateValue::from(state.as_str())
            }
        }

        impl ::std::convert::TryFrom<$crate::core::StateValue> for $name {
            type Error = $crate::core::UnknownState;

            fn try_from(value: $crate::core::StateValue) -> ::std::result::Result<Self, Self::Error> {
                match value.as_str() {
                    $(Some($value) => Ok(Self::$variant),)*
                    _ => Err($crate::core::UnknownState {
                        state_type: stringify!($name),
                        value,
                    }),
                }
            }
        }
    };
}
