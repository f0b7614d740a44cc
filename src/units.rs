/// Unit string of a named parameter, using the `<param>_<mechanism>` naming
/// for mechanism parameters, e.g. `gnabar_hh`.
pub fn units(name: &str) -> Option<&'static str> {
    let unit = match name {
        "gnabar_hh" | "gkbar_hh" | "gl_hh" | "g_pas" => "S/cm2",
        "el_hh" | "ena" | "ek" | "e_pas" | "v" => "mV",
        "m_hh" | "h_hh" | "n_hh" => "1",
        "ina" | "ik" | "il_hh" | "i_pas" => "mA/cm2",
        "L" | "diam" => "um",
        "Ra" => "ohm-cm",
        "cm" => "uF/cm2",
        "amp_IClamp" | "i_IClamp" => "nA",
        "del_IClamp" | "dur_IClamp" | "t" | "dt" => "ms",
        "celsius" => "degC",
        _ => return None,
    };
    Some(unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_units() {
        assert_eq!(units("gnabar_hh"), Some("S/cm2"));
        assert_eq!(units("e_pas"), Some("mV"));
        assert_eq!(units("amp_IClamp"), Some("nA"));
        assert_eq!(units("bogus"), None);
    }
}
