use crate::utils::PassportError;
use std::collections::BTreeSet;
use std::path::Path;

/// Document type letters accepted in the first MRZ column.
pub const DOCUMENT_TYPES: [char; 5] = ['P', 'A', 'C', 'I', 'V'];

// ISO 3166-1 alpha-3, plus the ICAO "D" code used by Germany
const ISO_3166_ALPHA3: &[&str] = &[
    "ABW", "AFG", "AGO", "AIA", "ALA", "ALB", "AND", "ARE", "ARG", "ARM", "ASM", "ATA", "ATF",
    "ATG", "AUS", "AUT", "AZE", "BDI", "BEL", "BEN", "BES", "BFA", "BGD", "BGR", "BHR", "BHS",
    "BIH", "BLM", "BLR", "BLZ", "BMU", "BOL", "BRA", "BRB", "BRN", "BTN", "BVT", "BWA", "CAF",
    "CAN", "CCK", "CHE", "CHL", "CHN", "CIV", "CMR", "COD", "COG", "COK", "COL", "COM", "CPV",
    "CRI", "CUB", "CUW", "CXR", "CYM", "CYP", "CZE", "DEU", "DJI", "DMA", "DNK", "DOM", "DZA",
    "ECU", "EGY", "ERI", "ESH", "ESP", "EST", "ETH", "FIN", "FJI", "FLK", "FRA", "FRO", "FSM",
    "GAB", "GBR", "GEO", "GGY", "GHA", "GIB", "GIN", "GLP", "GMB", "GNB", "GNQ", "GRC", "GRD",
    "GRL", "GTM", "GUF", "GUM", "GUY", "HKG", "HMD", "HND", "HRV", "HTI", "HUN", "IDN", "IMN",
    "IND", "IOT", "IRL", "IRN", "IRQ", "ISL", "ISR", "ITA", "JAM", "JEY", "JOR", "JPN", "KAZ",
    "KEN", "KGZ", "KHM", "KIR", "KNA", "KOR", "KWT", "LAO", "LBN", "LBR", "LBY", "LCA", "LIE",
    "LKA", "LSO", "LTU", "LUX", "LVA", "MAC", "MAF", "MAR", "MCO", "MDA", "MDG", "MDV", "MEX",
    "MHL", "MKD", "MLI", "MLT", "MMR", "MNE", "MNG", "MNP", "MOZ", "MRT", "MSR", "MTQ", "MUS",
    "MWI", "MYS", "MYT", "NAM", "NCL", "NER", "NFK", "NGA", "NIC", "NIU", "NLD", "NOR", "NPL",
    "NRU", "NZL", "OMN", "PAK", "PAN", "PCN", "PER", "PHL", "PLW", "PNG", "POL", "PRI", "PRK",
    "PRT", "PRY", "PSE", "PYF", "QAT", "REU", "ROU", "RUS", "RWA", "SAU", "SDN", "SEN", "SGP",
    "SGS", "SHN", "SJM", "SLB", "SLE", "SLV", "SMR", "SOM", "SPM", "SRB", "SSD", "STP", "SUR",
    "SVK", "SVN", "SWE", "SWZ", "SXM", "SYC", "SYR", "TCA", "TCD", "TGO", "THA", "TJK", "TKL",
    "TKM", "TLS", "TON", "TTO", "TUN", "TUR", "TUV", "TWN", "TZA", "UGA", "UKR", "UMI", "URY",
    "USA", "UZB", "VAT", "VCT", "VEN", "VGB", "VIR", "VNM", "VUT", "WLF", "WSM", "YEM", "ZAF",
    "ZMB", "ZWE", "D",
];

/// Reference set of country codes handed to the validator.
///
/// Built once by the caller and shared immutably (usually behind an `Arc`)
/// for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryCodes {
    codes: BTreeSet<String>,
}

impl CountryCodes {
    pub fn iso3166_alpha3() -> Self {
        Self::from_codes(ISO_3166_ALPHA3.iter().copied())
    }

    pub fn from_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let codes = codes
            .into_iter()
            .map(|code| code.as_ref().trim().to_ascii_uppercase())
            .filter(|code| !code.is_empty())
            .collect();
        CountryCodes { codes }
    }

    /// Load a table from a JSON array of strings or a file with one code per line.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PassportError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let table = if content.trim_start().starts_with('[') {
            let codes: Vec<String> = serde_json::from_str(&content).map_err(|e| {
                PassportError::ConfigError(format!(
                    "Invalid country code list {}: {}",
                    path.display(),
                    e
                ))
            })?;
            Self::from_codes(codes)
        } else {
            Self::from_codes(content.lines().filter(|line| !line.trim_start().starts_with('#')))
        };

        if table.is_empty() {
            return Err(PassportError::ConfigError(format!(
                "Country code list {} is empty",
                path.display()
            )));
        }
        Ok(table)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.codes.contains(code)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl Default for CountryCodes {
    fn default() -> Self {
        Self::iso3166_alpha3()
    }
}
