use anyhow::{bail, Context};

/// Parses a JSON array of `host:port` contact points, the format used by the
/// `CASSANDRA_CONTACT_POINTS` environment variable.
pub fn parse_contact_points(s: &str) -> anyhow::Result<Vec<String>> {
    let points: Vec<String> =
        serde_json::from_str(s).with_context(|| format!("Expected a JSON array of \"host:port\" strings: {s}"))?;
    for point in &points {
        let (_host, port) =
            point.rsplit_once(':').with_context(|| format!("Contact point is missing a port: {point}"))?;
        port.parse::<u16>().with_context(|| format!("Invalid port in contact point: {point}"))?;
    }
    if points.is_empty() {
        bail!("Contact point list cannot be empty");
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_parse_contact_points() {
        assert_eq!(parse_contact_points(r#"["localhost:9042"]"#).unwrap(), vec!["localhost:9042".to_string()]);
        assert_eq!(
            parse_contact_points(r#"["10.0.0.1:9042", "10.0.0.2:9043"]"#).unwrap(),
            vec!["10.0.0.1:9042".to_string(), "10.0.0.2:9043".to_string()]
        );
        assert!(parse_contact_points("[]").is_err());
        assert!(parse_contact_points(r#"["localhost"]"#).is_err());
        assert!(parse_contact_points(r#"["localhost:what"]"#).is_err());
        assert!(parse_contact_points("localhost:9042").is_err());
    }
}
