//! Compiled keyword rules, Portuguese first with common English equivalents.

use std::sync::LazyLock;

use regex::Regex;

fn compile(pattern: &str) -> Regex {
    // patterns are literals in this file; a failure is a programming error
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid classifier pattern {pattern:?}: {e}"))
}

pub(super) static UNRESTRICTED: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"(?i)\b(?:nsfw|sexo|sexual|sexy|er[óo]tic[oa]s?|porn\w*|nudes?|nudez|sem censura|uncensored|jailbreak|sem filtros?|sem restri[çc][õo]es)\b|\+18\b",
    )
});

pub(super) static TECHNICAL: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"(?i)\b(?:c[óo]digos?|code|scripts?|programa[çr]\w*|deploy|configurar|erros?|error|bugs?|debug\w*|otimizar|optimi[sz]e|arquitetura|treinar|fine-?tune|finetune|qlora|lora|modelos?|benchmarks?|tutorial|compilar|compile|api|sql|python|rust|javascript|typescript|java|docker|kubernetes|linux|git|fun[çc][ãa]o|function|algoritmos?|algorithm|servidor|server|banco de dados|database|regex|json|html|css|react|analisar|profundo|detalhes?)\b|\bcomo fa[çc]o\b",
    )
});

pub(super) static CREATIVE: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"(?i)\b(?:poemas?|poesia|poeta|poem|poetry|versos?|rimas?|haicai|haiku|contos?|story|tale|crie|criar|invente|inventar|imagine|escreva|escrever|write|letra de m[úu]sica|can[çc][ãa]o|song|lyrics|roteiro|piadas?|joke|fic[çc][ãa]o|fiction)\b|\b(?:conte|invente|escreva|crie) uma hist[óo]ria\b",
    )
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rules_compile() {
        assert!(!UNRESTRICTED.is_match("bom dia"));
        assert!(!TECHNICAL.is_match("bom dia"));
        assert!(!CREATIVE.is_match("bom dia"));
    }

    #[test]
    fn accented_and_unaccented_forms_match() {
        assert!(TECHNICAL.is_match("codigo"));
        assert!(TECHNICAL.is_match("código"));
        assert!(CREATIVE.is_match("cancao"));
        assert!(CREATIVE.is_match("canção"));
    }
}
