//! Visitor telemetry models.
//!
//! Every attribute is optional: an absent field means the sending side did not
//! collect it for this visitor. Only the `server` envelope of [`VisitorInfo`]
//! is required.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// --- Envelope ---

/// One visitor's telemetry as pushed by the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VisitorInfo {
    /// Browser/device-reported attributes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<ClientInfo>,
    /// Server-observed attributes
    pub server: ServerInfo,
}

impl VisitorInfo {
    /// Visitor carrying only server-observed data.
    pub fn from_server(server: ServerInfo) -> Self {
        Self {
            client: None,
            server,
        }
    }

    pub fn fingerprint_id(&self) -> Option<&str> {
        self.client.as_ref()?.fingerprint_id.as_deref()
    }

    pub fn ip(&self) -> Option<&str> {
        self.server.ip.as_deref()
    }
}

// --- Server side ---

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub geo: Option<GeoInfo>,
    /// Attributes this client does not model yet
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeoInfo {
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub isp: Option<String>,
    pub timezone: Option<String>,
}

impl GeoInfo {
    /// Human-readable "City, Region, Country" from whatever parts are present.
    pub fn location_label(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.city, &self.region, &self.country]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .filter(|p| !p.trim().is_empty())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

// --- Client side ---

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    // Identity
    pub fingerprint_id: Option<String>,
    pub cross_browser_id: Option<String>,
    pub fingerprint_confidence: Option<f64>,

    // Hardware
    pub platform: Option<String>,
    pub hardware_family: Option<String>,
    pub webgl_renderer: Option<String>,
    pub hardware_concurrency: Option<u32>,
    pub device_memory: Option<f64>,
    pub screen_width: Option<u32>,
    pub screen_height: Option<u32>,
    pub battery_level: Option<f64>,
    pub battery_charging: Option<bool>,
    pub media_devices: Option<MediaDevices>,
    pub sensors: Option<Sensors>,
    pub storage_quota: Option<StorageQuota>,

    // Network
    pub connection_type: Option<String>,
    pub connection_downlink: Option<f64>,
    pub connection_rtt: Option<f64>,
    #[serde(rename = "webrtcLocalIPs")]
    pub webrtc_local_ips: Option<Vec<String>>,
    pub vpn_detection: Option<VpnDetection>,

    // Fingerprint hashes
    pub canvas_fingerprint: Option<String>,
    pub webgl_fingerprint: Option<String>,
    pub audio_fingerprint: Option<String>,
    pub math_fingerprint: Option<String>,
    pub timing_fingerprint: Option<String>,
    pub speech_voices_hash: Option<String>,
    pub fonts_detected: Option<Vec<String>>,
    pub navigator_props_count: Option<u32>,
    pub window_props_count: Option<u32>,

    // Capabilities
    pub cookies_enabled: Option<bool>,
    pub local_storage_enabled: Option<bool>,
    #[serde(rename = "webRTCSupported")]
    pub webrtc_supported: Option<bool>,
    pub web_socket_supported: Option<bool>,
    pub web_worker_supported: Option<bool>,
    pub service_worker_supported: Option<bool>,
    pub bluetooth_supported: Option<bool>,
    pub gamepads_supported: Option<bool>,
    pub hdr_supported: Option<bool>,
    pub ad_blocker_detected: Option<bool>,
    pub is_incognito: Option<bool>,
    pub is_virtual_machine: Option<bool>,

    // Preferences
    pub prefers_color_scheme: Option<String>,
    pub prefers_reduced_motion: Option<bool>,
    pub prefers_contrast: Option<String>,

    pub social_logins: Option<SocialLogins>,
    pub behavior: Option<BehaviorMetrics>,
    pub advanced_behavior: Option<AdvancedBehavior>,
    pub user_profile: Option<UserProfile>,

    /// Attributes this client does not model yet
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub struct MediaDevices {
    pub audioinput: Option<u32>,
    pub audiooutput: Option<u32>,
    pub videoinput: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Sensors {
    pub accelerometer: Option<bool>,
    pub gyroscope: Option<bool>,
}

/// Storage estimate in bytes
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageQuota {
    pub quota: Option<f64>,
    pub usage: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VpnDetection {
    #[serde(rename = "likelyUsingVPN")]
    pub likely_using_vpn: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SocialLogins {
    pub google: Option<bool>,
    pub facebook: Option<bool>,
    pub twitter: Option<bool>,
    pub github: Option<bool>,
}

/// Behavioral biometrics collected while the page was open.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorMetrics {
    pub mouse_movements: Option<f64>,
    pub mouse_speed: Option<f64>,
    pub mouse_acceleration: Option<f64>,
    pub mouse_distance_traveled: Option<f64>,
    pub click_count: Option<f64>,
    /// Percent of the page
    pub scroll_depth_max: Option<f64>,
    /// Characters per minute
    pub typing_speed: Option<f64>,
    /// Milliseconds
    pub total_focus_time: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedBehavior {
    pub likely_handedness: Option<String>,
}

/// Attributes inferred from the rest of the telemetry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub age_range: Option<String>,
    pub income_level: Option<String>,
    pub education_level: Option<String>,
    pub relationship_status: Option<String>,
    pub homeowner: Option<bool>,
    pub device_age: Option<String>,
    pub estimated_device_value: Option<String>,
    pub likely_developer: Option<bool>,
    pub likely_gamer: Option<bool>,
    pub likely_tech_savvy: Option<bool>,
    pub privacy_conscious: Option<bool>,
    /// 0-100
    pub human_score: Option<f64>,
    /// 0-100
    pub fraud_risk_score: Option<f64>,
    pub inferred_interests: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_server_only_visitor() {
        let visitor: VisitorInfo =
            serde_json::from_value(json!({"server": {"ip": "1.2.3.4", "userAgent": "X"}}))
                .unwrap();

        assert!(visitor.client.is_none());
        assert_eq!(visitor.ip(), Some("1.2.3.4"));
        assert_eq!(visitor.server.user_agent.as_deref(), Some("X"));
        assert!(visitor.server.geo.is_none());
    }

    #[test]
    fn test_renamed_fields() {
        let client: ClientInfo = serde_json::from_value(json!({
            "webRTCSupported": true,
            "webrtcLocalIPs": ["192.168.1.4"],
            "vpnDetection": {"likelyUsingVPN": false},
            "mediaDevices": {"audioinput": 1, "audiooutput": 2, "videoinput": 0},
            "userProfile": {"fraudRiskScore": 12.5, "inferredInterests": ["gaming"]}
        }))
        .unwrap();

        assert_eq!(client.webrtc_supported, Some(true));
        assert_eq!(client.webrtc_local_ips, Some(vec!["192.168.1.4".to_string()]));
        assert_eq!(
            client.vpn_detection.and_then(|v| v.likely_using_vpn),
            Some(false)
        );
        assert_eq!(client.media_devices.and_then(|m| m.audiooutput), Some(2));
        let profile = client.user_profile.unwrap();
        assert_eq!(profile.fraud_risk_score, Some(12.5));
        assert_eq!(profile.inferred_interests, Some(vec!["gaming".to_string()]));
        assert!(client.extra.is_empty());
    }

    #[test]
    fn test_unknown_attributes_are_kept() {
        let value = json!({
            "client": {"fingerprintId": "abc", "gpuTier": 3},
            "server": {"ip": "10.0.0.1", "asn": "AS123"}
        });
        let visitor: VisitorInfo = serde_json::from_value(value).unwrap();

        let client = visitor.client.as_ref().unwrap();
        assert_eq!(visitor.fingerprint_id(), Some("abc"));
        assert_eq!(client.extra.get("gpuTier"), Some(&json!(3)));
        assert_eq!(visitor.server.extra.get("asn"), Some(&json!("AS123")));
    }

    #[test]
    fn test_location_label() {
        let geo = GeoInfo {
            city: Some("Lisbon".to_string()),
            region: Some("".to_string()),
            country: Some("Portugal".to_string()),
            ..Default::default()
        };
        assert_eq!(geo.location_label().as_deref(), Some("Lisbon, Portugal"));
        assert_eq!(GeoInfo::default().location_label(), None);
    }
}
