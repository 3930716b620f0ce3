use std::{io, io::ErrorKind};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Element {
    Hydrogen,
    Lithium,
    Boron,
    Carbon,
    Nitrogen,
    Oxygen,
    Fluorine,
    Sodium,
    Magnesium,
    Aluminum,
    Silicon,
    Phosphorus,
    Sulfur,
    Chlorine,
    Potassium,
    Calcium,
    Manganese,
    Iron,
    Copper,
    Zinc,
    Arsenic,
    Selenium,
    Bromine,
    Silver,
    Tin,
    Tellurium,
    Iodine,
    Tungsten,
    Gold,
    Mercury,
    Lead,
}

impl Element {
    /// Allowed valences, lowest first, used to derive implicit hydrogens for atoms written
    /// without brackets. Only the SMILES organic subset has entries; everything else must be
    /// written in bracket form, with its hydrogen count stated.
    pub fn valences(self) -> &'static [u8] {
        match self {
            Self::Hydrogen => &[1],
            Self::Boron => &[3],
            Self::Carbon => &[4],
            Self::Nitrogen => &[3],
            Self::Oxygen => &[2],
            Self::Phosphorus => &[3, 5],
            Self::Sulfur => &[2, 4, 6],
            Self::Fluorine | Self::Chlorine | Self::Bromine | Self::Iodine => &[1],
            _ => &[],
        }
    }

    pub fn from_letter(letter: &str) -> io::Result<Self> {
        match letter.to_uppercase().as_ref() {
            "H" => Ok(Self::Hydrogen),
            "LI" => Ok(Self::Lithium),
            "B" => Ok(Self::Boron),
            "C" => Ok(Self::Carbon),
            "N" => Ok(Self::Nitrogen),
            "O" => Ok(Self::Oxygen),
            "F" => Ok(Self::Fluorine),
            "NA" => Ok(Self::Sodium),
            "MG" => Ok(Self::Magnesium),
            "AL" => Ok(Self::Aluminum),
            "SI" => Ok(Self::Silicon),
            "P" => Ok(Self::Phosphorus),
            "S" => Ok(Self::Sulfur),
            "CL" => Ok(Self::Chlorine),
            "K" => Ok(Self::Potassium),
            "CA" => Ok(Self::Calcium),
            "MN" => Ok(Self::Manganese),
            "FE" => Ok(Self::Iron),
            "CU" => Ok(Self::Copper),
            "ZN" => Ok(Self::Zinc),
            "AS" => Ok(Self::Arsenic),
            "SE" => Ok(Self::Selenium),
            "BR" => Ok(Self::Bromine),
            "AG" => Ok(Self::Silver),
            "SN" => Ok(Self::Tin),
            "TE" => Ok(Self::Tellurium),
            "I" => Ok(Self::Iodine),
            "W" => Ok(Self::Tungsten),
            "AU" => Ok(Self::Gold),
            "HG" => Ok(Self::Mercury),
            "PB" => Ok(Self::Lead),
            _ => Err(io::Error::new(
                ErrorKind::InvalidData,
                format!("Invalid atom letter: {letter}"),
            )),
        }
    }

    pub fn to_letter(self) -> &'static str {
        match self {
            Self::Hydrogen => "H",
            Self::Lithium => "Li",
            Self::Boron => "B",
            Self::Carbon => "C",
            Self::Nitrogen => "N",
            Self::Oxygen => "O",
            Self::Fluorine => "F",
            Self::Sodium => "Na",
            Self::Magnesium => "Mg",
            Self::Aluminum => "Al",
            Self::Silicon => "Si",
            Self::Phosphorus => "P",
            Self::Sulfur => "S",
            Self::Chlorine => "Cl",
            Self::Potassium => "K",
            Self::Calcium => "Ca",
            Self::Manganese => "Mn",
            Self::Iron => "Fe",
            Self::Copper => "Cu",
            Self::Zinc => "Zn",
            Self::Arsenic => "As",
            Self::Selenium => "Se",
            Self::Bromine => "Br",
            Self::Silver => "Ag",
            Self::Tin => "Sn",
            Self::Tellurium => "Te",
            Self::Iodine => "I",
            Self::Tungsten => "W",
            Self::Gold => "Au",
            Self::Mercury => "Hg",
            Self::Lead => "Pb",
        }
    }

    #[rustfmt::skip]
    /// Standard (average) atomic weight, in daltons.
    /// https://iupac.qmul.ac.uk/AtWt/
    pub const fn atomic_weight(self) -> f64 {
        match self {
            Element::Hydrogen   => 1.008,
            Element::Lithium    => 6.941,
            Element::Boron      => 10.812,
            Element::Carbon     => 12.011,
            Element::Nitrogen   => 14.007,
            Element::Oxygen     => 15.999,
            Element::Fluorine   => 18.998,
            Element::Sodium     => 22.990,
            Element::Magnesium  => 24.305,
            Element::Aluminum   => 26.982,
            Element::Silicon    => 28.086,
            Element::Phosphorus => 30.974,
            Element::Sulfur     => 32.067,
            Element::Chlorine   => 35.453,
            Element::Potassium  => 39.098,
            Element::Calcium    => 40.078,
            Element::Manganese  => 54.938,
            Element::Iron       => 55.845,
            Element::Copper     => 63.546,
            Element::Zinc       => 65.39,
            Element::Arsenic    => 74.922,
            Element::Selenium   => 78.971,
            Element::Bromine    => 79.904,
            Element::Silver     => 107.868,
            Element::Tin        => 118.711,
            Element::Tellurium  => 127.6,
            Element::Iodine     => 126.904,
            Element::Tungsten   => 183.84,
            Element::Gold       => 196.967,
            Element::Mercury    => 200.59,
            Element::Lead       => 207.2,
        }
    }
}
