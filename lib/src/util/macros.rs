/// Builds a [`Dict`](crate::value::Dict) from `key => value` pairs.
///
/// ```rust
/// use marksmith::{dict, value::{Dict, Value}};
///
/// let dict: Dict = dict!["title" => "Home", "draft" => false];
/// assert_eq!(dict["title"], Value::from("Home"));
/// ```
#[doc(hidden)]
#[macro_export]
macro_rules! dict {
    ($($key:expr => $value:expr),* $(,)?) => ({
        #[allow(unused_mut)]
        let mut dict = $crate::value::Dict::new();
        $(dict.insert($key.into(), $crate::value::Value::from($value));)*
        dict
    });
}

pub use dict;
