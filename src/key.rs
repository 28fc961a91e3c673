use std::borrow::Cow;

/// Anything that can describe its own storage key.
///
/// Text and byte sequences are covered out of the box. Other types opt in
/// by implementing this trait; there is no formatting fallback, so the key
/// of a value never depends on its `Debug` output.
pub trait KeyProvider {
    fn key(&self) -> Cow<'_, str>;
}

impl KeyProvider for str {
    fn key(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl KeyProvider for String {
    fn key(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_str())
    }
}

// Invalid UTF-8 is replaced with U+FFFD.
impl KeyProvider for [u8] {
    fn key(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self)
    }
}

impl KeyProvider for Vec<u8> {
    fn key(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self)
    }
}

impl<T: KeyProvider + ?Sized> KeyProvider for &T {
    fn key(&self) -> Cow<'_, str> {
        (**self).key()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key(pub String);

impl KeyProvider for Key {
    fn key(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.0.as_str())
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key(s)
    }
}

impl From<&[u8]> for Key {
    fn from(b: &[u8]) -> Self {
        Key(String::from_utf8_lossy(b).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct User {
        id: u64,
    }

    impl KeyProvider for User {
        fn key(&self) -> Cow<'_, str> {
            Cow::Owned(format!("user:{}", self.id))
        }
    }

    #[test]
    fn test_text_keys_pass_through() {
        let owned = String::from("foo");
        let borrowed: &str = "foo";

        assert_eq!(owned.key(), "foo");
        assert_eq!(borrowed.key(), "foo");
        assert_eq!((&&owned).key(), "foo");
    }

    #[test]
    fn test_byte_keys_convert_to_text() {
        let bytes = b"foo".to_vec();
        assert_eq!(bytes.key(), "foo");
        assert_eq!(bytes.as_slice().key(), "foo");

        let invalid: &[u8] = &[0x66, 0xff];
        assert_eq!(invalid.key(), "f\u{fffd}");
    }

    #[test]
    fn test_key_provider_describes_itself() {
        let user = User { id: 42 };
        assert_eq!(user.key(), "user:42");
        assert_eq!((&user).key(), "user:42");
    }

    #[test]
    fn test_key_newtype_conversions() {
        assert_eq!(Key::from("a").key(), "a");
        assert_eq!(Key::from(String::from("b")).key(), "b");
        assert_eq!(Key::from(&b"c"[..]).key(), "c");
    }
}
