/// This macro generates a new type enum that is statically convertible to and from a provided base
/// type, along with the canonical text of every variant. It also generates a TryFrom<T>
/// implementation where T is the provided base type, this can be useful for checked conversion
/// from the base type to the enum.
///
/// # Usage
///
/// magic_enum! {
///     pub EnumName: base_type, ErrorType::ErrorVariant {
///         Variant = value => "text",
///         ...
///     }
/// }
#[macro_export]
macro_rules! magic_enum {
    ($(#[$meta:meta])* $vis:vis $name:ident: $typ:ident, $error:ident::$error_variant:ident {
        $($variant:ident = $value:literal => $text:literal),* $(,)?
    }) => {
        $(#[$meta])*
        #[repr($typ)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant = $value),*
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),*];

            #[inline]
            pub const fn code(self) -> $typ { self as $typ }

            pub const fn text(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)*
                }
            }
        }

        impl std::convert::TryFrom<$typ> for $name {
            type Error = $error;

            fn try_from(value: $typ) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok($name::$variant),)*
                    _ => Err($error::$error_variant(value)),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.text())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use thiserror::Error;

    #[derive(Debug, Error, PartialEq)]
    enum ShapeError {
        #[error("unknown shape {0}")]
        Unknown(u8)
    }

    magic_enum! {
        Shape: u8, ShapeError::Unknown {
            Circle = 1 => "circle",
            Square = 4 => "square",
        }
    }

    #[test]
    fn converts_both_ways() {
        assert_eq!(Shape::try_from(4), Ok(Shape::Square));
        assert_eq!(Shape::try_from(2), Err(ShapeError::Unknown(2)));
        assert_eq!(Shape::Circle.code(), 1);
        assert_eq!(Shape::Square.to_string(), "square");
        assert_eq!(Shape::ALL, &[Shape::Circle, Shape::Square]);
    }
}
