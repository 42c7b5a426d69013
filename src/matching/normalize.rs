//! Text normalization for product names and category paths.

/// French and English function words, accent-folded
const STOP_WORDS: &[&str] = &[
    // French
    "a", "au", "aux", "avec", "ce", "ces", "cet", "cette", "d", "dans", "de", "des", "du", "elle",
    "elles", "en", "est", "et", "il", "ils", "je", "l", "la", "le", "les", "leur", "leurs", "lui",
    "ma", "mais", "me", "mes", "moins", "mon", "n", "ne", "nos", "notre", "nous", "on", "ou", "par",
    "pas", "plus", "pour", "qu", "que", "qui", "s", "sa", "sans", "se", "ses", "son", "sont", "sur",
    "sous", "t", "ta", "te", "tes", "ton", "tres", "tu", "un", "une", "vos", "votre", "vous", "y",
    // English
    "an", "and", "are", "as", "at", "be", "by", "for", "from", "in", "is", "it", "its", "of", "on",
    "or", "the", "this", "that", "these", "those", "to", "with", "without",
];

fn fold_accent(c: char) -> char {
    match c {
        'à' | 'â' | 'ä' | 'á' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'î' | 'ï' | 'í' => 'i',
        'ô' | 'ö' | 'ó' => 'o',
        'ù' | 'û' | 'ü' | 'ú' => 'u',
        'ç' => 'c',
        'ÿ' => 'y',
        other => other,
    }
}

/// Reduce a folded token to a rough lemma: plural, `-eaux` and `-aux` forms
pub fn lemmatize(token: &str) -> String {
    if token.chars().all(|c| c.is_ascii_digit()) {
        return token.to_string();
    }
    let len = token.chars().count();
    let plural = (token.ends_with('s') && !token.ends_with("ss")) || token.ends_with("ux");
    if len > 4 && token.ends_with("eaux") {
        token[..token.len() - 1].to_string()
    } else if len > 4 && token.ends_with("aux") {
        format!("{}al", &token[..token.len() - 3])
    } else if len > 4 && token.ends_with("ies") {
        format!("{}y", &token[..token.len() - 3])
    } else if len > 3 && plural {
        token[..token.len() - 1].to_string()
    } else {
        token.to_string()
    }
}

/// Lower-cases, strips punctuation and stop words, lemmatizes what remains
#[derive(Debug, Clone, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, text: &str) -> String {
        let folded: String = text.chars().flat_map(char::to_lowercase).map(fold_accent).collect();
        folded
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty() && !STOP_WORDS.contains(token))
            .map(lemmatize)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_stop_words_and_punctuation() {
        let n = Normalizer::new();
        assert_eq!(n.normalize("Vasque à poser, blanche (60 cm)"), "vasque poser blanche 60 cm");
        assert_eq!(n.normalize("Salle_de_bain"), "salle bain");
    }

    #[test]
    fn lemmatizes_plurals() {
        let n = Normalizer::new();
        assert_eq!(n.normalize("Carreaux muraux"), "carreau mural");
        assert_eq!(n.normalize("Bijoux inox"), "bijou inox");
        assert_eq!(n.normalize("Robinets mitigeurs"), "robinet mitigeur");
        assert_eq!(n.normalize("Batteries"), "battery");
        assert_eq!(n.normalize("Verre"), "verre");
        assert_eq!(n.normalize("Cross 2x"), "cross 2x");
    }

    #[test]
    fn empty_and_stop_only_text_normalizes_to_empty() {
        let n = Normalizer::new();
        assert_eq!(n.normalize(""), "");
        assert_eq!(n.normalize("   "), "");
        assert_eq!(n.normalize("de la"), "");
    }
}
