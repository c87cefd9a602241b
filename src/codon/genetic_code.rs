//! Translating nucleotide triplets into amino acids.

/// The amino acid emitted for triplets that cannot be translated.
pub const UNKNOWN_AMINO_ACID: char = 'X';

/// The NCBI standard code (table 1), ordered `TTT, TTC, TTA, TTG, TCT, ...`.
const STANDARD_CODE: &[u8; 64] =
    b"FFLLSSSSYY**CC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG";

/// A genetic code.
///
/// Translation is stateless: one instance can be shared freely across
/// threads and handed to every transcription call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GeneticCode {
    /// The name of the code.
    name: &'static str,

    /// Amino acids indexed by `16 * first + 4 * second + third`, where
    /// `T = 0`, `C = 1`, `A = 2`, and `G = 3`.
    table: [u8; 64],
}

impl GeneticCode {
    /// The standard genetic code.
    pub fn standard() -> Self {
        Self {
            name: "Standard",
            table: *STANDARD_CODE,
        }
    }

    /// Gets the name of the code.
    pub fn name(&self) -> &str {
        self.name
    }

    /// Translates a single triplet.
    ///
    /// Ambiguity codes are expanded and translate only when every expansion
    /// yields the same amino acid. Gaps, unknown characters, and triplets of
    /// the wrong length translate to [`UNKNOWN_AMINO_ACID`].
    ///
    /// # Examples
    ///
    /// ```
    /// use varscope::codon::GeneticCode;
    ///
    /// let code = GeneticCode::standard();
    ///
    /// assert_eq!(code.translate_codon("ATG"), 'M');
    /// assert_eq!(code.translate_codon("taa"), '*');
    /// assert_eq!(code.translate_codon("GCN"), 'A');
    /// assert_eq!(code.translate_codon("ATN"), 'X');
    /// assert_eq!(code.translate_codon("A-G"), 'X');
    /// assert_eq!(code.translate_codon("AT"), 'X');
    /// ```
    pub fn translate_codon(&self, codon: &str) -> char {
        let bases = codon.as_bytes();

        if bases.len() != 3 {
            return UNKNOWN_AMINO_ACID;
        }

        let (first, second, third) = (
            expansions(bases[0]),
            expansions(bases[1]),
            expansions(bases[2]),
        );

        let mut result = None;

        for a in first {
            for b in second {
                for c in third {
                    let amino_acid = self.table[(16 * a + 4 * b + c) as usize];

                    match result {
                        None => result = Some(amino_acid),
                        Some(existing) if existing != amino_acid => return UNKNOWN_AMINO_ACID,
                        Some(_) => {}
                    }
                }
            }
        }

        result.map(char::from).unwrap_or(UNKNOWN_AMINO_ACID)
    }

    /// Translates consecutive triplets, ignoring a trailing partial triplet.
    pub fn translate(&self, nucleotides: &str) -> String {
        nucleotides
            .as_bytes()
            .chunks_exact(3)
            .map(|codon| match std::str::from_utf8(codon) {
                Ok(codon) => self.translate_codon(codon),
                Err(_) => UNKNOWN_AMINO_ACID,
            })
            .collect()
    }
}

impl Default for GeneticCode {
    fn default() -> Self {
        Self::standard()
    }
}

/// The table indices a single IUPAC nucleotide may stand for.
fn expansions(base: u8) -> &'static [u8] {
    match base.to_ascii_uppercase() {
        b'T' | b'U' => &[0],
        b'C' => &[1],
        b'A' => &[2],
        b'G' => &[3],
        b'R' => &[2, 3],
        b'Y' => &[0, 1],
        b'K' => &[0, 3],
        b'M' => &[1, 2],
        b'S' => &[1, 3],
        b'W' => &[0, 2],
        b'B' => &[0, 1, 3],
        b'D' => &[0, 2, 3],
        b'H' => &[0, 1, 2],
        b'V' => &[1, 2, 3],
        b'N' => &[0, 1, 2, 3],
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_unambiguous_codon_translates() {
        let code = GeneticCode::standard();
        let bases = ['T', 'C', 'A', 'G'];
        let mut translated = String::new();

        for a in bases {
            for b in bases {
                for c in bases {
                    translated.push(code.translate_codon(&format!("{a}{b}{c}")));
                }
            }
        }

        assert_eq!(translated.as_bytes(), STANDARD_CODE);
    }

    #[test]
    fn ambiguity_resolves_only_when_synonymous() {
        let code = GeneticCode::standard();

        // Leucine: CTN and YTR.
        assert_eq!(code.translate_codon("CTN"), 'L');
        assert_eq!(code.translate_codon("YTG"), 'L');
        // Arginine/serine split on AGY vs AGR.
        assert_eq!(code.translate_codon("AGY"), 'S');
        assert_eq!(code.translate_codon("AGN"), 'X');
        assert_eq!(code.translate_codon("NNN"), 'X');
    }

    #[test]
    fn translate_ignores_trailing_bases() {
        let code = GeneticCode::standard();
        assert_eq!(code.translate("ATGAAACT"), "MK");
        assert_eq!(code.translate("AUGUAA"), "M*");
    }
}
