use serde::Deserialize;

#[derive(Deserialize, Debug)]
#[serde(default)]
pub(crate) struct Settings {
    /// UDP port of the OSC endpoint.
    pub osc_port: u16,
    /// TCP port of the namespace query endpoint.
    pub query_port: u16,
    /// Event-queue depth handed to the surface driver at open time.
    pub surface_capacity: usize,
    /// Run the power-on sweep across the surface after binding.
    pub self_test: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            osc_port: 1234,
            query_port: 5678,
            surface_capacity: 1024,
            self_test: true,
        }
    }
}

impl Settings {
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.osc_port == 0 {
            return Err("osc_port must not be 0".to_string());
        }

        if self.query_port == 0 {
            return Err("query_port must not be 0".to_string());
        }

        if self.osc_port == self.query_port {
            return Err(format!(
                "osc_port and query_port must differ (both are {})",
                self.osc_port
            ));
        }

        if self.surface_capacity == 0 {
            return Err("surface_capacity must not be 0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn clashing_ports_are_rejected() {
        let settings = Settings {
            osc_port: 9000,
            query_port: 9000,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn zero_values_are_rejected() {
        assert!(Settings {
            osc_port: 0,
            ..Settings::default()
        }
        .validate()
        .is_err());
        assert!(Settings {
            surface_capacity: 0,
            ..Settings::default()
        }
        .validate()
        .is_err());
    }
}
