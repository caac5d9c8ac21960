//! Convenience macros for component authors.

/// Builds a [`Kwargs`](modhost_core::types::Kwargs) map. Each value is a
/// single token tree handed to `serde_json::json!`.
///
/// # Example
/// ```rust,ignore
/// let kwargs = kwargs!{ "uid" => 7, "label" => "front" };
/// manager.load("sensornode", kwargs)?;
/// ```
#[macro_export]
macro_rules! kwargs {
    () => {
        $crate::serde_json::Map::<String, $crate::serde_json::Value>::new()
    };
    ($($key:expr => $value:tt),* $(,)?) => {{
        let mut kwargs = $crate::serde_json::Map::<String, $crate::serde_json::Value>::new();
        $(
            kwargs.insert($key.to_string(), $crate::serde_json::json!($value));
        )*
        kwargs
    }};
}

/// Builds a [`HookAttachment`](crate::hooks::definitions::HookAttachment)
/// from an owner and a closure returning `Result<bool, CallbackError>`.
///
/// # Example
/// ```rust,ignore
/// let attachment = attachment!(Owner::Manager, |event| Ok(event.get("x").is_some()))
///     .load_on_true("gamma");
/// ```
#[macro_export]
macro_rules! attachment {
    ($owner:expr, $callback:expr) => {
        $crate::hooks::definitions::HookAttachment::new(
            $owner,
            $crate::hooks::definitions::hook_callback($callback),
        )
    };
}
