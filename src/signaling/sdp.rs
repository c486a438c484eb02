//! SDP Codec-Präferenz
//!
//! Sortiert die Payload-Typen der `m=audio` Zeile so um, dass ein bestimmter
//! Codec zuerst angeboten wird. Es wird nichts entfernt, nur verschoben.

use regex::Regex;

/// Bevorzugt `codec` (z.B. `ISAC/16000`) in der `m=audio` Zeile
///
/// Fehlt die `m=audio` Zeile, die passende `a=rtpmap` Zeile im Audio-Abschnitt
/// oder der Payload-Typ in der `m=audio` Zeile, wird das SDP unverändert
/// zurückgegeben. Sonst wird mit CRLF neu zusammengesetzt.
pub fn prefer_codec(sdp: &str, codec: &str) -> String {
    let pattern = format!(r"^a=rtpmap:(\d+) {}\r?$", regex::escape(codec));
    let rtpmap = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(e) => {
            tracing::warn!("Invalid codec pattern for {}: {}", codec, e);
            return sdp.to_string();
        }
    };

    let normalized = sdp.replace("\r\n", "\n");
    let mut lines: Vec<String> = normalized.split('\n').map(str::to_string).collect();

    let Some(m_line_index) = lines.iter().position(|l| l.starts_with("m=audio ")) else {
        tracing::debug!("No m=audio line, so can't prefer {}", codec);
        return sdp.to_string();
    };

    // Nur die Attribute des Audio-Abschnitts, bis zur nächsten m= Zeile
    let payload_type = lines[m_line_index + 1..]
        .iter()
        .take_while(|l| !l.starts_with("m="))
        .find_map(|l| {
            rtpmap
                .captures(l)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        });
    let Some(payload_type) = payload_type else {
        tracing::debug!("No {} line, so can't prefer {}", codec, codec);
        return sdp.to_string();
    };

    // Format: m=<media> <port> <proto> <fmt> ...
    let parts: Vec<&str> = lines[m_line_index].split(' ').collect();
    if parts.len() < 3 {
        tracing::debug!("Malformed m=audio line: {}", lines[m_line_index]);
        return sdp.to_string();
    }
    if !parts[3..].contains(&payload_type.as_str()) {
        tracing::debug!(
            "Payload type {} not listed in m=audio, so can't prefer {}",
            payload_type,
            codec
        );
        return sdp.to_string();
    }

    let mut m_line: Vec<&str> = parts[..3].to_vec();
    m_line.push(&payload_type);
    m_line.extend(parts[3..].iter().filter(|p| **p != payload_type));

    let rewritten = m_line.join(" ");
    lines[m_line_index] = rewritten;
    lines.join("\r\n")
}

// ============================================================================
// TESTS
// ============================================================================
