use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, TextAnalyzer, TokenStream};

/// Lowercasing analyzer that splits on every non-alphanumeric character.
/// No stemming and no stop words, so every surface term stays scorable.
pub fn build_analyzer() -> TextAnalyzer {
	TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(LowerCaser)
		.build()
}

pub fn tokenize_with(analyzer: &mut TextAnalyzer, text: &str) -> Vec<String> {
	let mut stream = analyzer.token_stream(text);
	let mut tokens = Vec::new();
	while stream.advance() { tokens.push(stream.token().text.clone()); }
	tokens
}

pub fn tokenize(text: &str) -> Vec<String> {
	tokenize_with(&mut build_analyzer(), text)
}
