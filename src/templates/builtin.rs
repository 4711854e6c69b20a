// Built-in starter project templates

use crate::generation::intent::find_word;
use crate::models::GeneratedFile;

/// A fixed starter project served without calling the model
#[derive(Debug, Clone)]
pub struct StarterTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// Words whose presence in a prompt selects this template
    pub keywords: &'static [&'static str],
    files: &'static [(&'static str, &'static str)],
}

impl StarterTemplate {
    /// Number of distinct keywords present in the prompt
    pub fn score(&self, prompt: &str) -> usize {
        let text = prompt.to_lowercase();
        self.keywords
            .iter()
            .filter(|keyword| find_word(&text, keyword).is_some())
            .count()
    }

    /// Shared scaffold plus the template's own files
    pub fn files(&self) -> Vec<GeneratedFile> {
        SCAFFOLD
            .iter()
            .chain(self.files.iter())
            .map(|(path, content)| GeneratedFile::new(path, *content))
            .collect()
    }
}

/// All builtin starter templates
pub fn starter_templates() -> &'static [StarterTemplate] {
    STARTERS
}

/// Best-scoring template for a prompt; earlier templates win ties
pub fn match_template(prompt: &str) -> Option<&'static StarterTemplate> {
    let mut best: Option<(&'static StarterTemplate, usize)> = None;
    for template in STARTERS {
        let score = template.score(prompt);
        if score > 0 && best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((template, score));
        }
    }
    best.map(|(template, _)| template)
}

pub fn get_template(id: &str) -> Option<&'static StarterTemplate> {
    STARTERS.iter().find(|t| t.id == id)
}

const PACKAGE_JSON: &str = r#"{
  "name": "livegen-app",
  "private": true,
  "version": "0.0.0",
  "type": "module",
  "scripts": {
    "dev": "vite",
    "build": "tsc -b && vite build",
    "preview": "vite preview"
  },
  "dependencies": {
    "react": "^18.3.1",
    "react-dom": "^18.3.1"
  },
  "devDependencies": {
    "@types/react": "^18.3.3",
    "@types/react-dom": "^18.3.0",
    "@vitejs/plugin-react": "^4.3.1",
    "typescript": "^5.5.3",
    "vite": "^5.4.0"
  }
}
"#;

const INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <title>Livegen App</title>
  </head>
  <body>
    <div id="root"></div>
    <script type="module" src="/src/main.tsx"></script>
  </body>
</html>
"#;

const VITE_CONFIG: &str = r#"import { defineConfig } from 'vite';
import react from '@vitejs/plugin-react';

export default defineConfig({
  plugins: [react()],
});
"#;

const TSCONFIG: &str = r#"{
  "compilerOptions": {
    "target": "ES2020",
    "lib": ["ES2020", "DOM", "DOM.Iterable"],
    "module": "ESNext",
    "moduleResolution": "bundler",
    "jsx": "react-jsx",
    "strict": true,
    "skipLibCheck": true,
    "noEmit": true
  },
  "include": ["src"]
}
"#;

const MAIN_TSX: &str = r#"import { StrictMode } from 'react';
import { createRoot } from 'react-dom/client';
import App from './App';
import './index.css';

createRoot(document.getElementById('root')!).render(
  <StrictMode>
    <App />
  </StrictMode>,
);
"#;

const INDEX_CSS: &str = r#":root {
  font-family: system-ui, -apple-system, sans-serif;
  color: #1f2937;
  background: #f9fafb;
}

body {
  margin: 0;
}

.container {
  max-width: 40rem;
  margin: 0 auto;
  padding: 2rem 1rem;
}

button {
  cursor: pointer;
  border: 1px solid #d1d5db;
  border-radius: 0.375rem;
  background: white;
  padding: 0.4rem 0.8rem;
}
"#;

const SCAFFOLD: &[(&str, &str)] = &[
    ("package.json", PACKAGE_JSON),
    ("index.html", INDEX_HTML),
    ("vite.config.ts", VITE_CONFIG),
    ("tsconfig.json", TSCONFIG),
    ("src/main.tsx", MAIN_TSX),
    ("src/index.css", INDEX_CSS),
];

const TODO_TYPES: &str = r#"export interface Todo {
  id: number;
  title: string;
  done: boolean;
}
"#;

const TODO_APP: &str = r#"import { useState } from 'react';
import TodoItem from './components/TodoItem';
import type { Todo } from './types';

export default function App() {
  const [todos, setTodos] = useState<Todo[]>([]);
  const [title, setTitle] = useState('');

  const addTodo = () => {
    const trimmed = title.trim();
    if (!trimmed) return;
    setTodos([...todos, { id: Date.now(), title: trimmed, done: false }]);
    setTitle('');
  };

  const toggle = (id: number) =>
    setTodos(todos.map((t) => (t.id === id ? { ...t, done: !t.done } : t)));

  const remove = (id: number) => setTodos(todos.filter((t) => t.id !== id));

  return (
    <main className="container">
      <h1>Todos</h1>
      <form
        onSubmit={(e) => {
          e.preventDefault();
          addTodo();
        }}
      >
        <input value={title} onChange={(e) => setTitle(e.target.value)} placeholder="What needs doing?" />
        <button type="submit">Add</button>
      </form>
      <ul>
        {todos.map((todo) => (
          <TodoItem key={todo.id} todo={todo} onToggle={toggle} onRemove={remove} />
        ))}
      </ul>
      <p>{todos.filter((t) => !t.done).length} remaining</p>
    </main>
  );
}
"#;

const TODO_ITEM: &str = r#"import type { Todo } from '../types';

interface TodoItemProps {
  todo: Todo;
  onToggle: (id: number) => void;
  onRemove: (id: number) => void;
}

export default function TodoItem({ todo, onToggle, onRemove }: TodoItemProps) {
  return (
    <li>
      <label style={{ textDecoration: todo.done ? 'line-through' : 'none' }}>
        <input type="checkbox" checked={todo.done} onChange={() => onToggle(todo.id)} />
        {todo.title}
      </label>
      <button onClick={() => onRemove(todo.id)}>Delete</button>
    </li>
  );
}
"#;

const COUNTER_APP: &str = r#"import Counter from './components/Counter';

export default function App() {
  return (
    <main className="container">
      <h1>Counter</h1>
      <Counter initial={0} step={1} />
    </main>
  );
}
"#;

const COUNTER_COMPONENT: &str = r#"import { useState } from 'react';

interface CounterProps {
  initial: number;
  step: number;
}

export default function Counter({ initial, step }: CounterProps) {
  const [count, setCount] = useState(initial);

  return (
    <div>
      <p>Count: {count}</p>
      <button onClick={() => setCount(count - step)}>-</button>
      <button onClick={() => setCount(initial)}>Reset</button>
      <button onClick={() => setCount(count + step)}>+</button>
    </div>
  );
}
"#;

const LANDING_APP: &str = r#"import Hero from './components/Hero';
import Features from './components/Features';

export default function App() {
  return (
    <main>
      <Hero title="Ship faster" subtitle="Everything you need to launch your next idea." />
      <Features />
    </main>
  );
}
"#;

const LANDING_HERO: &str = r#"interface HeroProps {
  title: string;
  subtitle: string;
}

export default function Hero({ title, subtitle }: HeroProps) {
  return (
    <section className="container">
      <h1>{title}</h1>
      <p>{subtitle}</p>
      <button>Get started</button>
    </section>
  );
}
"#;

const LANDING_FEATURES: &str = r#"const FEATURES = [
  { title: 'Fast', body: 'Instant reloads while you edit.' },
  { title: 'Typed', body: 'TypeScript from the first line.' },
  { title: 'Simple', body: 'No configuration to maintain.' },
];

export default function Features() {
  return (
    <section className="container">
      {FEATURES.map((feature) => (
        <article key={feature.title}>
          <h2>{feature.title}</h2>
          <p>{feature.body}</p>
        </article>
      ))}
    </section>
  );
}
"#;

static STARTERS: &[StarterTemplate] = &[
    StarterTemplate {
        id: "todo",
        name: "Todo list",
        description: "Add, complete and delete todo items",
        keywords: &["todo", "todos", "task", "tasks", "checklist"],
        files: &[
            ("src/types.ts", TODO_TYPES),
            ("src/App.tsx", TODO_APP),
            ("src/components/TodoItem.tsx", TODO_ITEM),
        ],
    },
    StarterTemplate {
        id: "counter",
        name: "Counter",
        description: "A counter with increment, decrement and reset",
        keywords: &["counter", "count", "increment", "clicker"],
        files: &[
            ("src/App.tsx", COUNTER_APP),
            ("src/components/Counter.tsx", COUNTER_COMPONENT),
        ],
    },
    StarterTemplate {
        id: "landing",
        name: "Landing page",
        description: "Hero section with a feature grid",
        keywords: &["landing", "homepage", "marketing", "hero"],
        files: &[
            ("src/App.tsx", LANDING_APP),
            ("src/components/Hero.tsx", LANDING_HERO),
            ("src/components/Features.tsx", LANDING_FEATURES),
        ],
    },
];
