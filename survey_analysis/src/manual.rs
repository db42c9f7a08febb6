/*!

This is the long-form manual for `survey_analysis` and `survex`.

## Input folder

The data folder contains one spreadsheet per client (`.xlsx` or `.xls`). The client name is
the file name without its extension, cut at the first double underscore:
`Acme Corp__2024-05 export.xlsx` is loaded as client `Acme Corp`.

The optional file `client_industry_mapping.xlsx` maps clients to industries. Its first sheet
must have the columns `Client` and `Industry`. Clients that are missing from it are reported
and grouped under `Unknown`.

## Spreadsheet layouts

| Layout          | Sheet           | Header row | First data row |
|-----------------|-----------------|------------|----------------|
| `raw-data-v1`   | `Raw Data`      | 1          | 2              |
| `raw-data-v2`   | `Raw Data`      | 2          | 3              |
| `scoring-sheet` | `Scoring Sheet` | 6          | 7              |

Rows are numbered from 1 as in Excel. The layout is picked from the sheet names. A `Raw Data`
sheet whose first row already contains the usual identifier columns (`Participant Identifier`,
`Email Address`, `Rating`) is read as `raw-data-v1`, otherwise the first row is treated as a
banner. It can be forced with `--layout`.

Duplicated column names are renamed `Name`, `Name.1`, `Name.2`, ... and empty header cells
are named `Unnamed: <column index>`.

## Configuration

The survey rules are a JSON file:

```json
{
  "configVersion": "2024.1",
  "questionSet": "whitelist",
  "scoredQuestions": ["How often do you use AI tools in your day-to-day work?"],
  "orgReadinessQuestions": ["Does your organization have a clear AI policy?"],
  "validAnswers": {
    "How often do you use AI tools in your day-to-day work?": ["Daily", "Weekly", "Never"]
  },
  "yesNoQuestions": [],
  "proficiencyLevels": ["AI Expert", "AI Beginner"]
}
```

- `questionSet`: `whitelist` only analyzes the listed questions, `permissive` treats every
  column that is not demographic or a system column as a question.
- `validAnswers`: answers outside of these lists are dropped from the counts. A question with
  a list is a single-select question, or a multi-select question when its text contains
  `select all that apply`. A listed question without answers is a free response.
- `yesNoQuestions`: `True`/`False` answers are rewritten as `Yes`/`No`.
- `demographicKeywords`, `excludedColumns`: optional overrides.

Whatever the configuration says, a question is displayed as multi-select when one of its first
20 answers contains a comma or a semicolon.

*/
