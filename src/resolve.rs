//! Local filename and download link derivation for catalog resources.

use std::borrow::Cow;

use crate::domain::ResourceDescriptor;

/// Derives the local file name for `resource`.
///
/// With a URL, the URL is percent-decoded (plus as space) for as long as a
/// `%2` sequence remains, and the last `/` segment is used. Without one, the
/// display name gets the lower-cased format appended as an extension unless
/// the name already ends with it.
pub fn resolve_filename(resource: &ResourceDescriptor) -> String {
    if let Some(url) = resource.url() {
        let decoded = decode_nested(url);
        let segment = last_segment(&decoded);
        if !segment.is_empty() {
            return segment.to_string();
        }
    }
    filename_from_name(resource.name(), resource.format())
}

/// `download_url` wins over `url`. `None` means the resource cannot be fetched.
pub fn select_download_link(resource: &ResourceDescriptor) -> Option<&str> {
    resource.download_url().or_else(|| resource.url())
}

pub fn filename_from_name(name: &str, format: &str) -> String {
    let extension = format.to_lowercase();
    if name.to_lowercase().ends_with(&extension) {
        name.to_string()
    } else {
        format!("{name}.{extension}")
    }
}

/// Whether `name` stays inside the directory it is joined onto.
pub fn is_safe_filename(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

/// Text after the final `/`, query string included.
pub fn last_segment(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

fn decode_nested(url: &str) -> String {
    let mut current = url.to_string();
    while current.contains("%2") {
        let next = unquote_plus(&current);
        // A stray "%2" that is not a valid escape never goes away.
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn unquote_plus(value: &str) -> String {
    let spaced = value.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(text) => text.into_owned(),
        Err(_) => {
            let bytes: Cow<'_, [u8]> = urlencoding::decode_binary(spaced.as_bytes());
            String::from_utf8_lossy(&bytes).into_owned()
        }
    }
}
