use phf::{Map, phf_map};

/// A chemical element with its standard atomic weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Element {
    pub symbol: &'static str,
    pub number: u8,
    /// Standard atomic weight in atomic mass units.
    pub mass: f64,
}

#[rustfmt::skip]
static ELEMENTS: [Element; 86] = [
    Element { symbol: "H",  number: 1,  mass: 1.008 },
    Element { symbol: "He", number: 2,  mass: 4.002602 },
    Element { symbol: "Li", number: 3,  mass: 6.94 },
    Element { symbol: "Be", number: 4,  mass: 9.0121831 },
    Element { symbol: "B",  number: 5,  mass: 10.81 },
    Element { symbol: "C",  number: 6,  mass: 12.011 },
    Element { symbol: "N",  number: 7,  mass: 14.007 },
    Element { symbol: "O",  number: 8,  mass: 15.999 },
    Element { symbol: "F",  number: 9,  mass: 18.998403163 },
    Element { symbol: "Ne", number: 10, mass: 20.1797 },
    Element { symbol: "Na", number: 11, mass: 22.98976928 },
    Element { symbol: "Mg", number: 12, mass: 24.305 },
    Element { symbol: "Al", number: 13, mass: 26.9815385 },
    Element { symbol: "Si", number: 14, mass: 28.085 },
    Element { symbol: "P",  number: 15, mass: 30.973761998 },
    Element { symbol: "S",  number: 16, mass: 32.06 },
    Element { symbol: "Cl", number: 17, mass: 35.45 },
    Element { symbol: "Ar", number: 18, mass: 39.948 },
    Element { symbol: "K",  number: 19, mass: 39.0983 },
    Element { symbol: "Ca", number: 20, mass: 40.078 },
    Element { symbol: "Sc", number: 21, mass: 44.955908 },
    Element { symbol: "Ti", number: 22, mass: 47.867 },
    Element { symbol: "V",  number: 23, mass: 50.9415 },
    Element { symbol: "Cr", number: 24, mass: 51.9961 },
    Element { symbol: "Mn", number: 25, mass: 54.938044 },
    Element { symbol: "Fe", number: 26, mass: 55.845 },
    Element { symbol: "Co", number: 27, mass: 58.933194 },
    Element { symbol: "Ni", number: 28, mass: 58.6934 },
    Element { symbol: "Cu", number: 29, mass: 63.546 },
    Element { symbol: "Zn", number: 30, mass: 65.38 },
    Element { symbol: "Ga", number: 31, mass: 69.723 },
    Element { symbol: "Ge", number: 32, mass: 72.630 },
    Element { symbol: "As", number: 33, mass: 74.921595 },
    Element { symbol: "Se", number: 34, mass: 78.971 },
    Element { symbol: "Br", number: 35, mass: 79.904 },
    Element { symbol: "Kr", number: 36, mass: 83.798 },
    Element { symbol: "Rb", number: 37, mass: 85.4678 },
    Element { symbol: "Sr", number: 38, mass: 87.62 },
    Element { symbol: "Y",  number: 39, mass: 88.90584 },
    Element { symbol: "Zr", number: 40, mass: 91.224 },
    Element { symbol: "Nb", number: 41, mass: 92.90637 },
    Element { symbol: "Mo", number: 42, mass: 95.95 },
    Element { symbol: "Tc", number: 43, mass: 97.90721 },
    Element { symbol: "Ru", number: 44, mass: 101.07 },
    Element { symbol: "Rh", number: 45, mass: 102.90550 },
    Element { symbol: "Pd", number: 46, mass: 106.42 },
    Element { symbol: "Ag", number: 47, mass: 107.8682 },
    Element { symbol: "Cd", number: 48, mass: 112.414 },
    Element { symbol: "In", number: 49, mass: 114.818 },
    Element { symbol: "Sn", number: 50, mass: 118.710 },
    Element { symbol: "Sb", number: 51, mass: 121.760 },
    Element { symbol: "Te", number: 52, mass: 127.60 },
    Element { symbol: "I",  number: 53, mass: 126.90447 },
    Element { symbol: "Xe", number: 54, mass: 131.293 },
    Element { symbol: "Cs", number: 55, mass: 132.90545196 },
    Element { symbol: "Ba", number: 56, mass: 137.327 },
    Element { symbol: "La", number: 57, mass: 138.90547 },
    Element { symbol: "Ce", number: 58, mass: 140.116 },
    Element { symbol: "Pr", number: 59, mass: 140.90766 },
    Element { symbol: "Nd", number: 60, mass: 144.242 },
    Element { symbol: "Pm", number: 61, mass: 144.91276 },
    Element { symbol: "Sm", number: 62, mass: 150.36 },
    Element { symbol: "Eu", number: 63, mass: 151.964 },
    Element { symbol: "Gd", number: 64, mass: 157.25 },
    Element { symbol: "Tb", number: 65, mass: 158.92535 },
    Element { symbol: "Dy", number: 66, mass: 162.500 },
    Element { symbol: "Ho", number: 67, mass: 164.93033 },
    Element { symbol: "Er", number: 68, mass: 167.259 },
    Element { symbol: "Tm", number: 69, mass: 168.93422 },
    Element { symbol: "Yb", number: 70, mass: 173.054 },
    Element { symbol: "Lu", number: 71, mass: 174.9668 },
    Element { symbol: "Hf", number: 72, mass: 178.49 },
    Element { symbol: "Ta", number: 73, mass: 180.94788 },
    Element { symbol: "W",  number: 74, mass: 183.84 },
    Element { symbol: "Re", number: 75, mass: 186.207 },
    Element { symbol: "Os", number: 76, mass: 190.23 },
    Element { symbol: "Ir", number: 77, mass: 192.217 },
    Element { symbol: "Pt", number: 78, mass: 195.084 },
    Element { symbol: "Au", number: 79, mass: 196.966569 },
    Element { symbol: "Hg", number: 80, mass: 200.592 },
    Element { symbol: "Tl", number: 81, mass: 204.38 },
    Element { symbol: "Pb", number: 82, mass: 207.2 },
    Element { symbol: "Bi", number: 83, mass: 208.98040 },
    Element { symbol: "Po", number: 84, mass: 208.98243 },
    Element { symbol: "At", number: 85, mass: 209.98715 },
    Element { symbol: "Rn", number: 86, mass: 222.01758 },
];

#[rustfmt::skip]
static SYMBOL_TO_NUMBER: Map<&'static str, u8> = phf_map! {
    "H" => 1, "He" => 2,
    "Li" => 3, "Be" => 4, "B" => 5, "C" => 6, "N" => 7, "O" => 8, "F" => 9, "Ne" => 10,
    "Na" => 11, "Mg" => 12, "Al" => 13, "Si" => 14, "P" => 15, "S" => 16, "Cl" => 17, "Ar" => 18,
    "K" => 19, "Ca" => 20, "Sc" => 21, "Ti" => 22, "V" => 23, "Cr" => 24, "Mn" => 25, "Fe" => 26,
    "Co" => 27, "Ni" => 28, "Cu" => 29, "Zn" => 30, "Ga" => 31, "Ge" => 32, "As" => 33, "Se" => 34,
    "Br" => 35, "Kr" => 36,
    "Rb" => 37, "Sr" => 38, "Y" => 39, "Zr" => 40, "Nb" => 41, "Mo" => 42, "Tc" => 43, "Ru" => 44,
    "Rh" => 45, "Pd" => 46, "Ag" => 47, "Cd" => 48, "In" => 49, "Sn" => 50, "Sb" => 51, "Te" => 52,
    "I" => 53, "Xe" => 54,
    "Cs" => 55, "Ba" => 56, "La" => 57, "Ce" => 58, "Pr" => 59, "Nd" => 60, "Pm" => 61, "Sm" => 62,
    "Eu" => 63, "Gd" => 64, "Tb" => 65, "Dy" => 66, "Ho" => 67, "Er" => 68, "Tm" => 69, "Yb" => 70,
    "Lu" => 71, "Hf" => 72, "Ta" => 73, "W" => 74, "Re" => 75, "Os" => 76, "Ir" => 77, "Pt" => 78,
    "Au" => 79, "Hg" => 80, "Tl" => 81, "Pb" => 82, "Bi" => 83, "Po" => 84, "At" => 85, "Rn" => 86,
};

/// Looks up an element by its chemical symbol (case-sensitive, e.g. `"Si"`).
pub fn by_symbol(symbol: &str) -> Option<&'static Element> {
    SYMBOL_TO_NUMBER.get(symbol).and_then(|&number| by_number(number))
}

/// Looks up an element by its atomic number.
pub fn by_number(number: u8) -> Option<&'static Element> {
    if number == 0 {
        return None;
    }
    ELEMENTS.get(usize::from(number) - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_indexed_by_atomic_number() {
        for (i, element) in ELEMENTS.iter().enumerate() {
            assert_eq!(usize::from(element.number), i + 1, "{}", element.symbol);
            assert_eq!(SYMBOL_TO_NUMBER.get(element.symbol), Some(&element.number));
        }
    }

    #[test]
    fn lookups_agree_in_both_directions() {
        let si = by_symbol("Si").unwrap();
        assert_eq!(si.number, 14);
        assert_eq!(by_number(14), Some(si));
        assert!((by_symbol("O").unwrap().mass - 15.999).abs() < 1e-12);
    }

    #[test]
    fn unknown_symbols_and_numbers_are_rejected() {
        assert!(by_symbol("Xx").is_none());
        assert!(by_symbol("si").is_none());
        assert!(by_number(0).is_none());
        assert!(by_number(118).is_none());
    }
}
