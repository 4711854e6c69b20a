// Integration tests for the streaming extractor, the response parser and stub repair
// Feeds whole model responses through the public generation API

#[cfg(test)]
mod parser_tests {
    use livegen_lib::generation::{parse, parse_response, validate, StreamingExtractor, StubRepairer};
    use livegen_lib::{FileSnapshot, GeneratedFile};

    const RESPONSE: &str = r#"<think>Maybe {"path": "scratch.ts", "content": "draft"} first</think>
Here is the app:
```json
{
  "files": [
    {"path": "./src/App.tsx", "content": "import Header from './components/Header';\nexport default function App() {\n  return <Header title=\"Café\" />;\n}\n"},
    {"path": "src/components/Header.tsx", "content": "export default function Header({ title }: { title: string }) {\n  return <h1>{title}<\/h1>;\n}\n"}
  ],
  "summary": "A header and an app shell"
}
```"#;

    fn feed_by_char(text: &str) -> Vec<GeneratedFile> {
        let mut extractor = StreamingExtractor::new();
        let mut found = Vec::new();
        let mut buf = [0u8; 4];
        for c in text.chars() {
            found.extend(extractor.add_chunk(c.encode_utf8(&mut buf)));
        }
        found
    }

    #[test]
    fn test_char_by_char_matches_full_parse() {
        let streamed = feed_by_char(RESPONSE);
        let parsed = parse(RESPONSE).expect("Response should parse");

        assert_eq!(streamed, parsed);
        assert_eq!(streamed.len(), 2);
        assert_eq!(streamed[0].path, "src/App.tsx");
        assert!(streamed[0].content.contains("Café"));
        assert!(streamed[1].content.contains("</h1>"));
    }

    #[test]
    fn test_reasoning_block_is_ignored() {
        let streamed = feed_by_char(RESPONSE);
        assert!(streamed.iter().all(|f| f.path != "scratch.ts"));

        let parsed = parse_response(RESPONSE).expect("Response should parse");
        assert_eq!(parsed.summary.as_deref(), Some("A header and an app shell"));
    }

    #[test]
    fn test_extractor_never_repeats_records() {
        let mut extractor = StreamingExtractor::new();
        let first = extractor.add_chunk(RESPONSE);
        assert_eq!(first.len(), 2);

        // Nothing new arrives, nothing new comes back
        assert!(extractor.add_chunk("").is_empty());
        assert!(extractor.add_chunk("\n\n").is_empty());

        // A repeated record for a known path is not reported twice
        let repeat = extractor.add_chunk(r#"{"path": "src/App.tsx", "content": "again"}"#);
        assert!(repeat.is_empty());
    }

    #[test]
    fn test_chunk_boundaries_do_not_matter() {
        let whole = StreamingExtractor::new().add_chunk(RESPONSE);
        for size in [2, 3, 5, 11, 64] {
            let mut extractor = StreamingExtractor::new();
            let mut found = Vec::new();
            let chars: Vec<char> = RESPONSE.chars().collect();
            for piece in chars.chunks(size) {
                let chunk: String = piece.iter().collect();
                found.extend(extractor.add_chunk(&chunk));
            }
            assert_eq!(found, whole, "chunk size {}", size);
        }
    }

    #[test]
    fn test_path_variants_collapse_to_one_entry() {
        let mut snapshot = FileSnapshot::new();
        snapshot.upsert("src/App.tsx", "one");
        snapshot.upsert("./src/App.tsx", "two");
        snapshot.upsert("/src/App.tsx", "three");

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("src/App.tsx"), Some("three"));
    }

    #[test]
    fn test_shared_missing_import_gets_one_stub() {
        // 1. Two files import the same missing page through different relative paths
        let files = vec![
            GeneratedFile::new("src/App.tsx", "import Home from './pages/Home';\n"),
            GeneratedFile::new("src/components/Nav.tsx", "import Home from '../pages/Home';\n"),
        ];

        // 2. Validation reports both references against one resolved path
        let report = validate(&files, &FileSnapshot::new());
        assert_eq!(report.missing_imports.len(), 2);
        assert!(report
            .missing_imports
            .iter()
            .all(|m| m.resolved_path == "src/pages/Home"));

        // 3. Repair produces a single component stub
        let repairer = StubRepairer::new();
        let stubs = repairer.repair(&report.missing_imports);
        assert_eq!(stubs.len(), 1);
        assert_eq!(stubs[0].path, "src/pages/Home.tsx");
        assert!(!stubs[0].content.contains("from './"));
        assert!(!stubs[0].content.contains("from '../"));

        // 4. Repair is deterministic
        assert_eq!(repairer.repair(&report.missing_imports), stubs);

        // 5. Once the stub exists the file set validates cleanly
        let mut repaired = files.clone();
        repaired.extend(stubs);
        assert!(validate(&repaired, &FileSnapshot::new()).missing_imports.is_empty());
    }

    #[test]
    fn test_existing_files_satisfy_imports() {
        let files = vec![GeneratedFile::new(
            "src/App.tsx",
            "import { useCart } from './hooks/useCart';\nimport './index.css';\n",
        )];
        let existing = FileSnapshot::from_files(vec![
            GeneratedFile::new("src/hooks/useCart.ts", "export function useCart() {}"),
            GeneratedFile::new("src/index.css", "body {}"),
        ]);

        let report = validate(&files, &existing);
        assert!(report.missing_imports.is_empty());
    }
}
